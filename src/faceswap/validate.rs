use crate::faceswap::models::{JPEG_MAGIC, MAX_IMAGE_BYTES, MIN_IMAGE_BYTES, PNG_MAGIC};

/// Outcome of validating one image. Violations accumulate so a caller can
/// report every problem at once instead of failing on the first one.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    violations: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn violations(&self) -> &[String] {
        &self.violations
    }

    fn push(&mut self, violation: impl Into<String>) {
        self.violations.push(violation.into());
    }
}

impl std::fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.violations.join("; "))
    }
}

fn has_jpeg_magic(bytes: &[u8]) -> bool {
    bytes.starts_with(&JPEG_MAGIC)
}

fn has_png_magic(bytes: &[u8]) -> bool {
    bytes.starts_with(&PNG_MAGIC)
}

/// Checks size bounds, declared content type and the binary signature at
/// offset 0. All checks run; overall validity is zero violations.
/// Validation failure is terminal for the job and never retried.
pub fn validate_image(bytes: &[u8], content_type: &str) -> ValidationReport {
    let mut report = ValidationReport::default();

    if bytes.len() > MAX_IMAGE_BYTES {
        report.push(format!(
            "image is {} bytes, larger than the {} byte maximum",
            bytes.len(),
            MAX_IMAGE_BYTES
        ));
    }
    if bytes.len() < MIN_IMAGE_BYTES {
        report.push(format!(
            "image is {} bytes, smaller than the {} byte minimum",
            bytes.len(),
            MIN_IMAGE_BYTES
        ));
    }

    let normalized = content_type.to_ascii_lowercase();
    if !matches!(normalized.as_str(), "image/jpeg" | "image/jpg" | "image/png") {
        report.push(format!("unsupported content type '{}'", content_type));
    }

    // Signature check against the declared type. When the declared type
    // hints neither jpeg nor png, either signature is accepted; the
    // unsupported-type violation above still fires for such inputs.
    let signature_ok = if normalized.contains("png") {
        has_png_magic(bytes)
    } else if normalized.contains("jpeg") || normalized.contains("jpg") {
        has_jpeg_magic(bytes)
    } else {
        has_jpeg_magic(bytes) || has_png_magic(bytes)
    };
    if !signature_ok {
        report.push(format!(
            "image data does not match the declared content type '{}'",
            content_type
        ));
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jpeg_buffer(len: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; len];
        bytes[..3].copy_from_slice(&JPEG_MAGIC);
        bytes
    }

    fn png_buffer(len: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; len];
        bytes[..4].copy_from_slice(&PNG_MAGIC);
        bytes
    }

    #[test]
    fn undersized_buffer_fails_regardless_of_content() {
        let report = validate_image(&jpeg_buffer(500), "image/jpeg");
        assert!(!report.is_valid());
        assert!(report.violations()[0].contains("smaller"));
    }

    #[test]
    fn oversized_buffer_fails_regardless_of_content() {
        let report = validate_image(&png_buffer(MAX_IMAGE_BYTES + 1), "image/png");
        assert!(!report.is_valid());
        assert!(report.violations()[0].contains("larger"));
    }

    #[test]
    fn valid_jpeg_passes() {
        let report = validate_image(&jpeg_buffer(50 * 1024), "image/jpeg");
        assert!(report.is_valid(), "violations: {}", report);
    }

    #[test]
    fn valid_png_passes() {
        let report = validate_image(&png_buffer(80 * 1024), "image/png");
        assert!(report.is_valid(), "violations: {}", report);
    }

    #[test]
    fn jpeg_magic_declared_as_png_is_a_signature_mismatch() {
        let report = validate_image(&jpeg_buffer(50 * 1024), "image/png");
        assert!(!report.is_valid());
        assert!(
            report
                .violations()
                .iter()
                .any(|v| v.contains("does not match"))
        );
    }

    #[test]
    fn unknown_content_type_accepts_either_signature_but_flags_the_type() {
        let report = validate_image(&png_buffer(10 * 1024), "image/webp");
        let violations = report.violations();
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("unsupported content type"));
    }

    #[test]
    fn violations_accumulate() {
        // Undersized, unsupported type and no recognizable signature.
        let report = validate_image(&[0u8; 10], "text/plain");
        assert_eq!(report.violations().len(), 3);
    }

    #[test]
    fn image_jpg_alias_is_accepted() {
        let report = validate_image(&jpeg_buffer(4096), "image/jpg");
        assert!(report.is_valid());
    }
}
