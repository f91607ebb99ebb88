//! Unit conversion into the canonical exported units

pub const BYTES_PER_MEGABYTE: f64 = 1_048_576.0;
pub const MILLICORES_PER_CORE: f64 = 1000.0;

pub fn bytes_to_megabytes(bytes: f64) -> f64 {
    bytes / BYTES_PER_MEGABYTE
}

pub fn cores_to_millicores(cores: f64) -> f64 {
    cores * MILLICORES_PER_CORE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_to_megabytes_exact() {
        assert_eq!(bytes_to_megabytes(1_048_576.0), 1.0);
        assert_eq!(bytes_to_megabytes(0.0), 0.0);
    }

    #[test]
    fn test_cores_to_millicores_exact() {
        assert_eq!(cores_to_millicores(1.0), 1000.0);
        assert_eq!(cores_to_millicores(0.25), 250.0);
    }

    #[test]
    fn test_nan_passes_through() {
        assert!(bytes_to_megabytes(f64::NAN).is_nan());
        assert!(cores_to_millicores(f64::NAN).is_nan());
    }
}
