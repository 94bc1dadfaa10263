//! 遗留编码文本处理
//!
//! 旧系统将韩文文本按EUC-KR单字节流存储，网关对外统一使用UTF-8。

use encoding_rs::EUC_KR;
use tracing::warn;

use crate::error::{LisError, Result};

/// 将EUC-KR字节序列解码为UTF-8字符串
///
/// 遗留表中偶有损坏字节，解码失败的位置以U+FFFD替换并告警，读取路径不因此失败。
pub fn decode_euc_kr(bytes: &[u8]) -> String {
    let (text, _, had_errors) = EUC_KR.decode(bytes);
    if had_errors {
        warn!("malformed EUC-KR sequence in legacy text field");
    }
    text.into_owned()
}

/// 将UTF-8字符串编码为EUC-KR字节序列
///
/// 写入路径必须严格: 无法映射的字符直接报错，不把替换符写进库里。
pub fn encode_euc_kr(text: &str) -> Result<Vec<u8>> {
    let (bytes, _, had_errors) = EUC_KR.encode(text);
    if had_errors {
        return Err(LisError::Encoding(format!(
            "text contains characters not representable in EUC-KR: {}",
            text
        )));
    }
    Ok(bytes.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_hangul() {
        // "한글" 的EUC-KR编码
        let bytes = [0xC7, 0xD1, 0xB1, 0xDB];
        assert_eq!(decode_euc_kr(&bytes), "한글");
    }

    #[test]
    fn test_decode_ascii_passthrough() {
        assert_eq!(decode_euc_kr(b"WBC 4.5"), "WBC 4.5");
    }

    #[test]
    fn test_decode_malformed_is_replaced() {
        // 截断的双字节序列
        let text = decode_euc_kr(&[0xC7]);
        assert!(text.contains('\u{FFFD}'));
    }

    #[test]
    fn test_encode_round_trip() {
        let bytes = encode_euc_kr("적혈구 수치 정상").unwrap();
        assert_eq!(decode_euc_kr(&bytes), "적혈구 수치 정상");
    }

    #[test]
    fn test_encode_unmappable_fails() {
        assert!(encode_euc_kr("\u{1F600}").is_err());
    }
}
