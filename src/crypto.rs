use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::warn;

/// Reversible obfuscation for secrets kept in the settings file.
pub trait CredentialCodec: Send + Sync {
    fn encode(&self, plain: &str) -> String;

    /// Inverse of [`CredentialCodec::encode`]. Never fails: input that was not
    /// produced by `encode` decodes to an empty string.
    fn decode(&self, encoded: &str) -> String;
}

const FORMAT_VERSION: u8 = 1;
const DEFAULT_KEY: u64 = 0x0c2a_d4a4_acb9_f023;

/// Keyed XOR with a random salt byte, wrapped in base64.
///
/// This keeps passwords out of plain sight in `settings.json`; it is not
/// encryption.
#[derive(Debug, Clone)]
pub struct TextCodec {
    key: [u8; 8],
}

impl Default for TextCodec {
    fn default() -> Self {
        Self::with_key(DEFAULT_KEY)
    }
}

impl TextCodec {
    pub fn with_key(key: u64) -> Self {
        Self {
            key: key.to_le_bytes(),
        }
    }

    fn scramble(&self, salt: u8, data: &mut [u8]) {
        for (i, byte) in data.iter_mut().enumerate() {
            *byte ^= self.key[i % self.key.len()] ^ salt.wrapping_add(i as u8);
        }
    }

    fn salt() -> u8 {
        let mut buf = [0u8; 1];
        if let Err(e) = getrandom::getrandom(&mut buf) {
            warn!(error = %e, "no randomness available for credential salt");
        }
        buf[0]
    }
}

impl CredentialCodec for TextCodec {
    fn encode(&self, plain: &str) -> String {
        if plain.is_empty() {
            return String::new();
        }

        let salt = Self::salt();
        let mut payload = plain.as_bytes().to_vec();
        self.scramble(salt, &mut payload);

        let mut framed = Vec::with_capacity(payload.len() + 2);
        framed.push(FORMAT_VERSION);
        framed.push(salt);
        framed.extend_from_slice(&payload);
        STANDARD.encode(framed)
    }

    fn decode(&self, encoded: &str) -> String {
        if encoded.is_empty() {
            return String::new();
        }

        let framed = match STANDARD.decode(encoded) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "stored credential is not valid base64");
                return String::new();
            }
        };

        let [version, salt, payload @ ..] = framed.as_slice() else {
            warn!("stored credential is truncated");
            return String::new();
        };
        if *version != FORMAT_VERSION {
            warn!(version, "stored credential has unknown format");
            return String::new();
        }

        let mut payload = payload.to_vec();
        self.scramble(*salt, &mut payload);
        String::from_utf8(payload).unwrap_or_else(|_| {
            warn!("stored credential does not decode to UTF-8");
            String::new()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let codec = TextCodec::default();
        for plain in ["", "secret", "pässwörd with spaces", "a", "🔑🔑🔑"] {
            assert_eq!(codec.decode(&codec.encode(plain)), plain);
        }
    }

    #[test]
    fn encoded_text_hides_the_secret() {
        let codec = TextCodec::default();
        let encoded = codec.encode("secret");
        assert!(!encoded.contains("secret"));
        assert!(!encoded.is_empty());
    }

    #[test]
    fn foreign_input_decodes_to_empty() {
        let codec = TextCodec::default();
        assert_eq!(codec.decode(""), "");
        assert_eq!(codec.decode("not base64 !!"), "");
        assert_eq!(codec.decode(&STANDARD.encode([FORMAT_VERSION])), "");
        assert_eq!(codec.decode(&STANDARD.encode([9, 1, 2, 3])), "");
    }

    #[test]
    fn different_keys_do_not_share_secrets() {
        let encoded = TextCodec::with_key(1).encode("secret");
        assert_ne!(TextCodec::with_key(2).decode(&encoded), "secret");
    }
}
