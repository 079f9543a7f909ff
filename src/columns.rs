use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static NON_CANONICAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[^A-Za-z0-9_ ]").expect("canonical charset regex")
});

/// Canonicalize one raw header: trim, NFKD-decompose and drop every
/// non-ASCII scalar (which strips the combining accents), remove characters
/// outside `[A-Za-z0-9_ ]`, trim again, upper-case.
///
/// Idempotent: canonical names pass through unchanged.
pub fn normalize_header(raw: &str) -> String {
    let ascii: String = raw.trim().nfkd().filter(char::is_ascii).collect();
    let stripped = NON_CANONICAL.replace_all(&ascii, "");
    stripped.trim().to_uppercase()
}

/// Canonicalize an ordered header row. Length and order are preserved.
/// Two raw headers may collapse to the same canonical name; this function
/// does not resolve that — the source reader rejects such files.
pub fn normalize_headers(raw: &[String]) -> Vec<String> {
    raw.iter().map(|h| normalize_header(h)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_accents_and_upcases() {
        assert_eq!(normalize_header("Número Participantes "), "NUMERO PARTICIPANTES");
        assert_eq!(normalize_header("Provisão Matemática"), "PROVISAO MATEMATICA");
    }

    #[test]
    fn drops_chars_outside_canonical_set() {
        assert_eq!(normalize_header("VL_CUSTO (R$)"), "VL_CUSTO R");
        assert_eq!(normalize_header("  Déficit/Superávit  "), "DEFICITSUPERAVIT");
    }

    #[test]
    fn underscores_and_spaces_survive() {
        assert_eq!(normalize_header("NU_CNPB_PLANO_DA"), "NU_CNPB_PLANO_DA");
        assert_eq!(normalize_header("qt meses contribuicao"), "QT MESES CONTRIBUICAO");
    }

    #[test]
    fn idempotent() {
        for raw in ["Número Participantes ", "VL_CUSTO (R$)", "ANO", "ção é ü"] {
            let once = normalize_header(raw);
            assert_eq!(normalize_header(&once), once);
        }
    }

    #[test]
    fn row_keeps_length_and_order() {
        let raw = vec!["B Coluna".to_string(), "A Coluna".to_string(), "C".to_string()];
        assert_eq!(normalize_headers(&raw), vec!["B COLUNA", "A COLUNA", "C"]);
    }
}
