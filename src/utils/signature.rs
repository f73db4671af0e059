// src/utils/signature.rs

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::{error::AppError, models::paper::Paper};

type HmacSha256 = Hmac<Sha256>;

/// Keyed integrity stamp over a paper's signed fields.
///
/// The signed string is `paperID|title|content|questions|unixSeconds`,
/// hashed with HMAC-SHA256 and hex encoded.
#[derive(Clone)]
pub struct PaperSigner {
    key: Vec<u8>,
}

impl PaperSigner {
    pub fn new(secret: &str) -> Self {
        Self {
            key: secret.as_bytes().to_vec(),
        }
    }

    fn mac(&self, paper: &Paper, signed_at: DateTime<Utc>) -> Result<HmacSha256, AppError> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|e| AppError::InternalServerError(format!("Invalid signing key: {}", e)))?;
        mac.update(payload(paper, signed_at).as_bytes());
        Ok(mac)
    }

    /// Computes the signature of `paper` as of `signed_at`.
    pub fn sign(&self, paper: &Paper, signed_at: DateTime<Utc>) -> Result<String, AppError> {
        let mac = self.mac(paper, signed_at)?;
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Recomputes the signature with the given timestamp and compares it in
    /// constant time. A malformed stored signature simply fails to verify.
    pub fn verify(
        &self,
        paper: &Paper,
        signed_at: DateTime<Utc>,
        signature: &str,
    ) -> Result<bool, AppError> {
        let Ok(expected) = hex::decode(signature) else {
            return Ok(false);
        };
        let mac = self.mac(paper, signed_at)?;
        Ok(mac.verify_slice(&expected).is_ok())
    }
}

impl std::fmt::Debug for PaperSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaperSigner").finish_non_exhaustive()
    }
}

fn payload(paper: &Paper, signed_at: DateTime<Utc>) -> String {
    format!(
        "{}|{}|{}|{}|{}",
        paper.id,
        paper.title,
        paper.content,
        paper.questions,
        signed_at.timestamp()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::paper::PaperStatus;
    use chrono::TimeZone;

    fn paper() -> Paper {
        let now = Utc::now();
        Paper {
            id: 7,
            exam_id: 3,
            title: "Midterm".into(),
            content: "Answer all questions".into(),
            questions: r#"[{"q":"2+2"}]"#.into(),
            duration: 90,
            total_score: 100.0,
            passing_score: 60.0,
            status: PaperStatus::Approved,
            signature: None,
            signed_at: None,
            signed_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn payload_layout() {
        assert_eq!(
            payload(&paper(), at()),
            format!("7|Midterm|Answer all questions|[{{\"q\":\"2+2\"}}]|{}", at().timestamp())
        );
    }

    #[test]
    fn signing_is_deterministic() {
        let signer = PaperSigner::new("k3y");
        let a = signer.sign(&paper(), at()).unwrap();
        let b = signer.sign(&paper(), at()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn verify_after_sign() {
        let signer = PaperSigner::new("k3y");
        let sig = signer.sign(&paper(), at()).unwrap();
        assert!(signer.verify(&paper(), at(), &sig).unwrap());
    }

    #[test]
    fn tampered_content_fails_verification() {
        let signer = PaperSigner::new("k3y");
        let sig = signer.sign(&paper(), at()).unwrap();

        let mut changed = paper();
        changed.content.push_str(" (revised)");
        assert!(!signer.verify(&changed, at(), &sig).unwrap());
    }

    #[test]
    fn key_and_timestamp_are_bound() {
        let sig = PaperSigner::new("k3y").sign(&paper(), at()).unwrap();
        assert!(!PaperSigner::new("other").verify(&paper(), at(), &sig).unwrap());

        let later = at() + chrono::Duration::seconds(1);
        assert!(!PaperSigner::new("k3y").verify(&paper(), later, &sig).unwrap());
    }

    #[test]
    fn garbage_signature_is_false_not_error() {
        let signer = PaperSigner::new("k3y");
        assert!(!signer.verify(&paper(), at(), "not-hex").unwrap());
    }
}
