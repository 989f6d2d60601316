/// PEM label of an X.509 certificate.
pub const CERTIFICATE_LABEL: &str = "CERTIFICATE";
/// PEM label of a PKCS#10 certificate request.
pub const CERTIFICATE_REQUEST_LABEL: &str = "CERTIFICATE REQUEST";

/// Convert DER-encoded data into a PEM-encoded string with the provided label.
pub fn der_to_pem(der: &[u8], label: &str) -> String {
    let pem = pem::Pem::new(label, der);
    pem::encode_config(&pem, pem::EncodeConfig::new().set_line_ending(pem::LineEnding::LF))
}

/// Contents of every PEM block in `input` labelled `label`, in file order.
/// Input that is not PEM at all yields no blocks.
pub fn blocks_with_label(input: &[u8], label: &str) -> Vec<Vec<u8>> {
    pem::parse_many(input)
        .unwrap_or_default()
        .into_iter()
        .filter(|block| block.tag() == label)
        .map(|block| block.into_contents())
        .collect()
}

/// The first `label` block of `input`, or `input` itself taken as DER.
pub fn first_block_or_der(input: &[u8], label: &str) -> Vec<u8> {
    blocks_with_label(input, label)
        .into_iter()
        .next()
        .unwrap_or_else(|| input.to_vec())
}

/// The last `label` block of `input`, or `input` itself taken as DER.
pub fn last_block_or_der(input: &[u8], label: &str) -> Vec<u8> {
    blocks_with_label(input, label)
        .pop()
        .unwrap_or_else(|| input.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_picks_blocks_by_label() {
        let input = format!(
            "{}{}{}",
            der_to_pem(&[1], "CERTIFICATE REQUEST"),
            der_to_pem(&[2], "CERTIFICATE"),
            der_to_pem(&[3], "CERTIFICATE REQUEST"),
        );
        assert_eq!(first_block_or_der(input.as_bytes(), CERTIFICATE_LABEL), vec![2]);
        assert_eq!(
            last_block_or_der(input.as_bytes(), CERTIFICATE_REQUEST_LABEL),
            vec![3]
        );
    }

    #[test]
    fn test_falls_back_to_der() {
        let der = [0x30, 0x03, 0x02, 0x01, 0x01];
        assert_eq!(first_block_or_der(&der, CERTIFICATE_LABEL), der.to_vec());
    }

    #[test]
    fn test_der_to_pem_round_trip() {
        let pem = der_to_pem(&[0xde, 0xad], "CERTIFICATE");
        assert!(pem.ends_with("-----END CERTIFICATE-----\n"));
        assert_eq!(first_block_or_der(pem.as_bytes(), CERTIFICATE_LABEL), vec![0xde, 0xad]);
    }
}
