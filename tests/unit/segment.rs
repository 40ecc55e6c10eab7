use super::*;

fn texts(segments: &[Segment]) -> Vec<&str> {
    segments.iter().map(|s| s.text.as_str()).collect()
}

fn strip_ws(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

#[test]
fn short_text_fits_one_segment() {
    let segs = segment("Hola. Esto es una prueba.", 300);
    assert_eq!(texts(&segs), vec!["Hola. Esto es una prueba."]);
    assert_eq!(segs[0].index, 0);
}

#[test]
fn tight_limit_flushes_between_clauses() {
    let segs = segment("Hola. Esto es una prueba.", 5);
    assert_eq!(texts(&segs), vec!["Hola.", "Esto es una prueba."]);
    assert_eq!(segs[1].index, 1);
}

#[test]
fn empty_and_whitespace_input_yield_nothing() {
    assert!(segment("", 300).is_empty());
    assert!(segment("   \n\t  ", 300).is_empty());
}

#[test]
fn oversized_clause_is_kept_whole() {
    let long = "Una frase muy larga que no cabe en el limite configurado.";
    let text = format!("Corta. {long} Otra.");
    let segs = segment(&text, 20);
    assert_eq!(texts(&segs), vec!["Corta.", long, "Otra."]);
}

#[test]
fn decimals_do_not_end_clauses() {
    let clauses = split_clauses("Cuesta 3.5 euros. ¿De verdad?! Sí…   fin");
    assert_eq!(
        clauses,
        vec!["Cuesta 3.5 euros.", "¿De verdad?!", "Sí…", "fin"]
    );
}

#[test]
fn closing_quotes_stay_with_their_clause() {
    let clauses = split_clauses("Dijo \"hola.\" Luego se fue.");
    assert_eq!(clauses, vec!["Dijo \"hola.\"", "Luego se fue."]);
}

#[test]
fn internal_whitespace_is_collapsed() {
    let segs = segment("  Uno\n\n dos   tres.   Cuatro.  ", 300);
    assert_eq!(texts(&segs), vec!["Uno dos tres. Cuatro."]);
}

#[test]
fn length_is_counted_in_characters() {
    // Each clause is 7 chars but 13 bytes.
    let segs = segment("ñáéíóú. ñáéíóú.", 15);
    assert_eq!(segs.len(), 1);
    assert_eq!(segs[0].char_len(), 15);

    let segs = segment("ñáéíóú. ñáéíóú.", 14);
    assert_eq!(segs.len(), 2);
}

#[test]
fn segments_reconstruct_source_and_respect_limit() {
    let text = "El viento soplaba. La noche era larga y oscura! ¿Quién llamaba a la puerta? \
                Nadie respondió. Un silencio espeso llenó la casa entera, de arriba abajo. \
                Fin";
    for max_len in [1usize, 10, 25, 40, 80, 300] {
        let segs = segment(text, max_len);
        let joined: String = segs.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(strip_ws(&joined), strip_ws(text), "max_len={max_len}");

        for s in &segs {
            if s.char_len() > max_len {
                assert_eq!(
                    split_clauses(&s.text).len(),
                    1,
                    "oversized segment must be a single clause (max_len={max_len})"
                );
            }
        }
        for (i, s) in segs.iter().enumerate() {
            assert_eq!(s.index, i);
        }
    }
}
