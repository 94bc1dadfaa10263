//! 十六进制图像载荷编解码
//!
//! 部分客户端以十六进制字符串上传图像结果，入库前还原为二进制。

use crate::error::{LisError, Result};

/// 将十六进制字符串解码为二进制图像数据
///
/// 允许可选的`0x`前缀; 其余字符必须是成对的十六进制数字。
pub fn decode_hex_image(payload: &str) -> Result<Vec<u8>> {
    let trimmed = payload.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    hex::decode(digits)
        .map_err(|e| LisError::Validation(format!("invalid hex image payload: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_round_trip() {
        let payload: Vec<u8> = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        let decoded = decode_hex_image(&hex::encode(&payload)).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_decode_with_prefix() {
        assert_eq!(decode_hex_image("0xDEADBEEF").unwrap(), vec![0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(decode_hex_image("0Xdeadbeef").unwrap(), vec![0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[test]
    fn test_decode_rejects_odd_length() {
        assert!(decode_hex_image("ABC").is_err());
    }

    #[test]
    fn test_decode_rejects_non_hex() {
        assert!(decode_hex_image("zzzz").is_err());
    }
}
