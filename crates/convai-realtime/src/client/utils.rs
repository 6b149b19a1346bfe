use anyhow::{Result, bail};
use secrecy::{ExposeSecret, SecretString};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;

/// Turns a signed conversation URL into a websocket handshake request.
///
/// The URL already carries its authorization, so no headers are added.
pub(crate) fn build_request(signed_url: &SecretString) -> Result<Request> {
    let url = signed_url.expose_secret();
    if !(url.starts_with("wss://") || url.starts_with("ws://")) {
        bail!("signed url is not a websocket url");
    }
    Ok(url.into_client_request()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_websocket_urls() {
        let url = SecretString::from("wss://api.example.test/v1/convai/conversation?agent_id=a&signature=s");
        let request = build_request(&url).unwrap();
        assert_eq!(request.uri().host(), Some("api.example.test"));
        assert_eq!(request.uri().query(), Some("agent_id=a&signature=s"));
    }

    #[test]
    fn rejects_http_urls_without_echoing_them() {
        let url = SecretString::from("https://api.example.test/?signature=secret");
        let err = build_request(&url).unwrap_err();
        assert!(!err.to_string().contains("secret"));
    }
}
