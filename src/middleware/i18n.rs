// src/middleware/i18n.rs

use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};

// Idiomas com mensagens traduzidas. O primeiro é o padrão.
const SUPPORTED: [&str; 2] = ["es", "en"];

// Extrator de idioma (Accept-Language). Padrão: espanhol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locale(pub String);

impl Default for Locale {
    fn default() -> Self {
        Locale(SUPPORTED[0].to_string())
    }
}

impl Locale {
    pub fn is_spanish(&self) -> bool {
        self.0 == "es"
    }
}

impl<S> FromRequestParts<S> for Locale
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let locale = parts
            .headers
            .get(header::ACCEPT_LANGUAGE)
            .and_then(|value| value.to_str().ok())
            .and_then(|header_str| {
                // "es-MX" -> "es"
                accept_language::intersection(header_str, &["es-MX", "es", "en-US", "en"])
                    .first()
                    .map(|tag| tag.split('-').next().unwrap_or(tag).to_string())
            })
            .map(Locale)
            .unwrap_or_default();

        Ok(locale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(header_value: Option<&str>) -> Locale {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header_value {
            builder = builder.header(header::ACCEPT_LANGUAGE, value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        Locale::from_request_parts(&mut parts, &()).await.unwrap()
    }

    #[tokio::test]
    async fn defaults_to_spanish_without_header() {
        assert_eq!(extract(None).await, Locale("es".into()));
    }

    #[tokio::test]
    async fn picks_english_when_preferred() {
        assert_eq!(extract(Some("en-US,en;q=0.9,es;q=0.5")).await, Locale("en".into()));
    }

    #[tokio::test]
    async fn unsupported_language_falls_back_to_spanish() {
        assert_eq!(extract(Some("pt-BR")).await, Locale("es".into()));
    }
}
