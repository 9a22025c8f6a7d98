use std::path::PathBuf;

use anyhow::{Result, bail};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::info;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Accepted avatar content types and the extension each is stored under.
const AVATAR_TYPES: &[(&str, &str)] = &[
    ("image/png", "png"),
    ("image/jpeg", "jpg"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
];

/// Profile pictures on local disk, addressed by `{user_id}/avatar.{ext}`.
///
/// Files are never served by path alone: clients get a URL carrying an
/// expiry and an HMAC-SHA256 signature over `path:expires`.
pub struct AvatarStorage {
    dir: PathBuf,
    mac: HmacSha256,
}

impl AvatarStorage {
    pub async fn new(dir: PathBuf, signing_secret: &str) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        let mac = HmacSha256::new_from_slice(signing_secret.as_bytes())
            .map_err(|e| anyhow::anyhow!("invalid avatar signing key: {}", e))?;
        info!("Avatar storage directory: {}", dir.display());
        Ok(Self { dir, mac })
    }

    /// Storage path for a user's avatar of the given content type, or
    /// `None` if the type is not an accepted image type.
    pub fn avatar_path(user_id: Uuid, content_type: &str) -> Option<String> {
        let ext = extension_for(content_type)?;
        Some(format!("{}/avatar.{}", user_id, ext))
    }

    /// Write (or overwrite) the object at `path`.
    pub async fn put(&self, path: &str, bytes: &[u8]) -> Result<()> {
        if !is_avatar_path(path) {
            bail!("refusing to write outside the avatar layout: {}", path);
        }

        let full = self.dir.join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&full).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        Ok(())
    }

    /// Bytes of the object at `path`, `None` if it does not exist.
    pub async fn get(&self, path: &str) -> Result<Option<Vec<u8>>> {
        if !is_avatar_path(path) {
            return Ok(None);
        }

        match fs::read(self.dir.join(path)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete the object at `path`. Deleting a missing object succeeds.
    pub async fn remove(&self, path: &str) -> Result<()> {
        if !is_avatar_path(path) {
            bail!("refusing to delete outside the avatar layout: {}", path);
        }

        match fs::remove_file(self.dir.join(path)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn signed_url(&self, path: &str, ttl: Duration, now: DateTime<Utc>) -> String {
        let expires = (now + ttl).timestamp();
        format!(
            "/avatars/{}?expires={}&sig={}",
            path,
            expires,
            hex::encode(self.signature(path, expires))
        )
    }

    /// Constant-time check of a signature produced by `signed_url`.
    pub fn verify(&self, path: &str, expires: i64, sig: &str, now: DateTime<Utc>) -> bool {
        if expires < now.timestamp() {
            return false;
        }
        let Ok(sig) = hex::decode(sig) else {
            return false;
        };

        let mut mac = self.mac.clone();
        mac.update(signing_input(path, expires).as_bytes());
        mac.verify_slice(&sig).is_ok()
    }

    fn signature(&self, path: &str, expires: i64) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(signing_input(path, expires).as_bytes());
        mac.finalize().into_bytes().to_vec()
    }
}

fn signing_input(path: &str, expires: i64) -> String {
    format!("{}:{}", path, expires)
}

pub fn extension_for(content_type: &str) -> Option<&'static str> {
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    AVATAR_TYPES
        .iter()
        .find(|(ct, _)| ct.eq_ignore_ascii_case(essence))
        .map(|(_, ext)| *ext)
}

pub fn content_type_for(path: &str) -> Option<&'static str> {
    let ext = path.rsplit_once('.')?.1;
    AVATAR_TYPES.iter().find(|(_, e)| *e == ext).map(|(ct, _)| *ct)
}

/// `{uuid}/avatar.{known ext}` and nothing else, so no path can escape the
/// storage directory.
fn is_avatar_path(path: &str) -> bool {
    let Some((owner, file)) = path.split_once('/') else {
        return false;
    };
    owner.parse::<Uuid>().is_ok()
        && file
            .strip_prefix("avatar.")
            .is_some_and(|ext| AVATAR_TYPES.iter().any(|(_, e)| *e == ext))
}
