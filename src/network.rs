//! HTTP access shared by every browser view.
//!
//! One [`WebNetworkManager`] is built at start-up and handed to each view as an
//! `Arc`, so credentials entered for one view are used by all of them.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::error::NetworkError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    fn basic_header(&self) -> String {
        let raw = format!("{}:{}", self.username, self.password);
        format!("Basic {}", STANDARD.encode(raw))
    }
}

/// A server asked for credentials before serving `url`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChallenge {
    pub url: String,
    pub host: String,
    pub realm: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Page { url: String, status: u16, body: String },
    AuthenticationRequired(AuthChallenge),
}

#[derive(Debug)]
struct StoredCredentials {
    realm: String,
    credentials: Credentials,
}

pub struct WebNetworkManager {
    agent: ureq::Agent,
    credentials: Mutex<HashMap<String, StoredCredentials>>,
}

impl WebNetworkManager {
    pub fn new() -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("tui-rss/", env!("CARGO_PKG_VERSION")))
            .build();
        Self {
            agent,
            credentials: Mutex::new(HashMap::new()),
        }
    }

    pub fn fetch(&self, url: &str) -> Result<FetchOutcome, NetworkError> {
        let parsed = Url::parse(url).map_err(|source| NetworkError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;
        let host = parsed
            .host_str()
            .ok_or_else(|| NetworkError::MissingHost(url.to_string()))?
            .to_string();

        let authorization = self
            .credentials
            .lock()
            .get(&host)
            .map(|stored| stored.credentials.basic_header());
        let sent_credentials = authorization.is_some();

        let mut request = self.agent.request_url("GET", &parsed);
        if let Some(header) = authorization.as_deref() {
            request = request.set("Authorization", header);
        }

        debug!(%url, authenticated = sent_credentials, "fetching page");
        match request.call() {
            Ok(response) => Ok(FetchOutcome::Page {
                url: url.to_string(),
                status: response.status(),
                body: response.into_string()?,
            }),
            Err(ureq::Error::Status(401, response)) => {
                let Some(header) = response.header("WWW-Authenticate").map(str::to_string) else {
                    return Ok(FetchOutcome::Page {
                        url: url.to_string(),
                        status: 401,
                        body: response.into_string()?,
                    });
                };

                if sent_credentials {
                    if let Some(stale) = self.credentials.lock().remove(&host) {
                        info!(%host, realm = %stale.realm, "stored credentials were rejected");
                    }
                }

                let realm = parse_basic_realm(&header)?;

                Ok(FetchOutcome::AuthenticationRequired(AuthChallenge {
                    url: url.to_string(),
                    host,
                    realm,
                }))
            }
            Err(ureq::Error::Status(status, response)) => Ok(FetchOutcome::Page {
                url: url.to_string(),
                status,
                body: response.into_string()?,
            }),
            Err(ureq::Error::Transport(transport)) => {
                Err(NetworkError::Transport(transport.to_string()))
            }
        }
    }

    /// Answers a challenge; later requests to the same host carry these
    /// credentials.
    pub fn provide_credentials(&self, challenge: &AuthChallenge, credentials: Credentials) {
        info!(host = %challenge.host, realm = %challenge.realm, "credentials provided");
        self.credentials.lock().insert(
            challenge.host.clone(),
            StoredCredentials {
                realm: challenge.realm.clone(),
                credentials,
            },
        );
    }

    /// Drops every cached credential. Returns how many hosts were forgotten.
    pub fn forget_credentials(&self) -> usize {
        let mut cache = self.credentials.lock();
        let count = cache.len();
        cache.clear();
        info!(hosts = count, "cached credentials cleared");
        count
    }
}

impl Default for WebNetworkManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Extracts the realm of a `Basic` challenge header.
fn parse_basic_realm(header: &str) -> Result<String, NetworkError> {
    let header = header.trim();
    let (scheme, params) = header.split_once(char::is_whitespace).unwrap_or((header, ""));
    if !scheme.eq_ignore_ascii_case("basic") {
        return Err(NetworkError::UnsupportedChallenge(scheme.to_string()));
    }

    let realm = params
        .split(',')
        .filter_map(|part| part.trim().split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("realm"))
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .unwrap_or_default();
    Ok(realm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn parses_basic_realm() {
        assert_eq!(parse_basic_realm(r#"Basic realm="Feeds""#).unwrap(), "Feeds");
        assert_eq!(
            parse_basic_realm(r#"basic charset="UTF-8", realm="News Site""#).unwrap(),
            "News Site"
        );
        assert_eq!(parse_basic_realm("Basic").unwrap(), "");
    }

    #[test]
    fn rejects_other_schemes() {
        let err = parse_basic_realm(r#"Digest realm="x", nonce="y""#).unwrap_err();
        assert!(matches!(err, NetworkError::UnsupportedChallenge(s) if s == "Digest"));
    }

    #[test]
    fn builds_basic_header() {
        let credentials = Credentials {
            username: "Aladdin".to_string(),
            password: "open sesame".to_string(),
        };
        assert_eq!(credentials.basic_header(), "Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ==");
    }

    #[test]
    fn invalid_urls_are_errors() {
        let manager = WebNetworkManager::new();
        assert!(matches!(
            manager.fetch("not a url"),
            Err(NetworkError::InvalidUrl { .. })
        ));
    }

    fn respond(stream: &mut std::net::TcpStream, status: &str, extra: &str, body: &str) {
        let response = format!(
            "HTTP/1.1 {}\r\n{}Content-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            extra,
            body.len(),
            body
        );
        stream.write_all(response.as_bytes()).unwrap();
    }

    #[test]
    fn challenge_then_authenticated_fetch() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            for _ in 0..2 {
                let (mut stream, _) = listener.accept().unwrap();
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut authorized = false;
                loop {
                    let mut line = String::new();
                    reader.read_line(&mut line).unwrap();
                    if line == "\r\n" || line.is_empty() {
                        break;
                    }
                    if line.to_ascii_lowercase().starts_with("authorization: basic ") {
                        authorized = true;
                    }
                }
                if authorized {
                    respond(&mut stream, "200 OK", "", "hello reader");
                } else {
                    respond(
                        &mut stream,
                        "401 Unauthorized",
                        "WWW-Authenticate: Basic realm=\"private feeds\"\r\n",
                        "",
                    );
                }
            }
        });

        let manager = WebNetworkManager::new();
        let url = format!("http://{}/feed", addr);

        let challenge = match manager.fetch(&url).unwrap() {
            FetchOutcome::AuthenticationRequired(challenge) => challenge,
            other => panic!("expected a challenge, got {:?}", other),
        };
        assert_eq!(challenge.realm, "private feeds");
        assert_eq!(challenge.host, "127.0.0.1");

        manager.provide_credentials(
            &challenge,
            Credentials {
                username: "alice".to_string(),
                password: "secret".to_string(),
            },
        );

        match manager.fetch(&url).unwrap() {
            FetchOutcome::Page { status, body, .. } => {
                assert_eq!(status, 200);
                assert_eq!(body, "hello reader");
            }
            other => panic!("expected a page, got {:?}", other),
        }

        server.join().unwrap();
    }

    #[test]
    fn rejected_credentials_are_dropped_on_unsupported_challenge() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if line == "\r\n" || line.is_empty() {
                    break;
                }
            }
            respond(
                &mut stream,
                "401 Unauthorized",
                "WWW-Authenticate: Digest realm=\"x\", nonce=\"y\"\r\n",
                "",
            );
        });

        let manager = WebNetworkManager::new();
        let challenge = AuthChallenge {
            url: format!("http://{}/feed", addr),
            host: "127.0.0.1".to_string(),
            realm: "private feeds".to_string(),
        };
        manager.provide_credentials(
            &challenge,
            Credentials {
                username: "alice".to_string(),
                password: "secret".to_string(),
            },
        );

        let err = manager.fetch(&challenge.url).unwrap_err();
        assert!(matches!(err, NetworkError::UnsupportedChallenge(_)));
        assert_eq!(manager.forget_credentials(), 0);

        server.join().unwrap();
    }
}
