//! Whitespace normalization for generated TypeScript.
//!
//! Output has LF line endings, no trailing spaces, at most one blank line in
//! a row and exactly one final newline, so repeated runs are byte-identical.
//! Text inside template literals (the embedded GraphQL documents) is kept
//! as written.

pub fn format_typescript(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut blank_run = 0;
    let mut in_template = false;

    for line in source.replace("\r\n", "\n").lines() {
        let starts_inside = in_template;
        in_template = template_open_after(line, in_template);

        let line = if in_template { line } else { line.trim_end() };
        if !starts_inside && line.is_empty() {
            blank_run += 1;
            continue;
        }
        if !out.is_empty() && blank_run > 0 {
            out.push('\n');
        }
        blank_run = 0;
        out.push_str(line);
        out.push('\n');
    }

    out
}

/// Whether a template literal is still open at the end of `line`.
///
/// Comment lines are skipped so backticks in doc comments stay inert.
fn template_open_after(line: &str, mut open: bool) -> bool {
    let trimmed = line.trim_start();
    if !open && (trimmed.starts_with("//") || trimmed.starts_with("/*") || trimmed.starts_with('*')) {
        return false;
    }

    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '`' => open = !open,
            _ => {}
        }
    }
    open
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_whitespace() {
        let formatted = format_typescript("\n\nexport type A = 1;   \r\n\n\n\nexport type B = 2;");
        assert_eq!(formatted, "export type A = 1;\n\nexport type B = 2;\n");
    }

    #[test]
    fn is_idempotent() {
        let once = format_typescript("a\n\n\nb  \n");
        assert_eq!(format_typescript(&once), once);
    }

    #[test]
    fn template_literals_are_left_alone() {
        let source = "export const A = parse(`query A {  \n  a   \n\n\n  b\n}`);   \n\n\nexport const B = 1;";
        assert_eq!(
            format_typescript(source),
            "export const A = parse(`query A {  \n  a   \n\n\n  b\n}`);\n\nexport const B = 1;\n"
        );
    }

    #[test]
    fn escaped_backticks_do_not_end_a_template() {
        let source = "const s = `x \\` y  \n\n\nz`;  \n";
        assert_eq!(format_typescript(source), "const s = `x \\` y  \n\n\nz`;\n");
        assert_eq!(format_typescript(&format_typescript(source)), format_typescript(source));
    }

    #[test]
    fn backticks_in_comments_are_inert() {
        let source = "/** Use ` sparingly */\nexport type A = 1;  \n\n\nexport type B = 2;";
        assert_eq!(
            format_typescript(source),
            "/** Use ` sparingly */\nexport type A = 1;\n\nexport type B = 2;\n"
        );
    }
}
