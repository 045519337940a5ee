use std::io::Write;
use std::{fs, path::Path, path::PathBuf};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;

use super::parsing::env_optional;

/// Reads the persisted signing key, creating it on first start.
///
/// Concurrent starts race on `create_new`; the loser re-reads the winner's key.
pub(super) fn load_or_create_secret_key() -> String {
    let path = secret_file_path();

    if let Some(existing) = read_key(&path) {
        return existing;
    }

    let new_key = generate_secret_key();

    if let Some(parent) = path.parent() {
        if let Err(err) = fs::create_dir_all(parent) {
            tracing::warn!(
                error = %err,
                path = %parent.display(),
                "Failed to create secret key directory"
            );
        }
    }

    match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
        Ok(mut file) => {
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;

                if let Err(err) = file.set_permissions(fs::Permissions::from_mode(0o600)) {
                    tracing::warn!(
                        error = %err,
                        path = %path.display(),
                        "Failed to restrict secret key file"
                    );
                }
            }

            if let Err(err) = file.write_all(new_key.as_bytes()) {
                let path = path.display();
                tracing::warn!(error = %err, path = %path, "Failed to persist secret key");
            }
            new_key
        }
        Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
            read_key(&path).unwrap_or(new_key)
        }
        Err(err) => {
            let path = path.display();
            tracing::warn!(error = %err, path = %path, "Failed to create secret key file");
            new_key
        }
    }
}

fn read_key(path: &Path) -> Option<String> {
    let value = fs::read_to_string(path).ok()?;
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn generate_secret_key() -> String {
    let mut bytes = [0u8; 64];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn secret_file_path() -> PathBuf {
    env_optional("QUIZBANK_SECRET_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(".secret_key"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_are_distinct_and_urlsafe() {
        let first = generate_secret_key();
        let second = generate_secret_key();
        assert_ne!(first, second);
        assert!(first.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_'));
    }

    #[test]
    fn read_key_ignores_blank_files() {
        let path = std::env::temp_dir().join(format!("quizbank-secret-{}", uuid::Uuid::new_v4()));
        fs::write(&path, "   \n").expect("write blank key");
        assert!(read_key(&path).is_none());

        fs::write(&path, "abc\n").expect("write key");
        assert_eq!(read_key(&path).as_deref(), Some("abc"));
        let _ = fs::remove_file(&path);
    }
}
