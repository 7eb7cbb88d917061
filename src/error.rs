use thiserror::Error;

/// Upstream response bodies are truncated to this many characters before they
/// are embedded in error messages.
const BODY_SNIPPET_CHARS: usize = 200;

/// Failures talking to the IXC webservice. `Transport`, `UpstreamStatus` and
/// `Parse` map one-to-one to the failure modes of a search call; none of them
/// is retried here, retry policy belongs to the caller.
#[derive(Debug, Error)]
pub enum IxcError {
    #[error("falha de conexão com o IXC: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("IXC retornou {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    #[error("erro ao parsear resposta do IXC: {message} - corpo: {body}")]
    Parse { message: String, body: String },

    #[error("API do IXC não configurada. Defina IXC_API_BASE_URL e IXC_API_TOKEN.")]
    NotConfigured,

    #[error("erro interno: {0}")]
    Internal(String),
}

/// Char-boundary-safe truncation for diagnostic snippets.
pub fn truncate_body(raw: &str) -> String {
    raw.chars().take(BODY_SNIPPET_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::truncate_body;

    #[test]
    fn truncates_long_bodies_to_snippet_length() {
        let long = "x".repeat(500);
        assert_eq!(truncate_body(&long).len(), 200);
    }

    #[test]
    fn keeps_short_bodies_intact() {
        assert_eq!(truncate_body("<html>erro</html>"), "<html>erro</html>");
    }

    #[test]
    fn does_not_split_multibyte_chars() {
        let accented = "ã".repeat(300);
        let truncated = truncate_body(&accented);
        assert_eq!(truncated.chars().count(), 200);
    }
}
