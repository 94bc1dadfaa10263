//! 数据库行映射

use tiberius::Row;

use lis_core::models::{CbcResultRow, ImageMetaRow};
use lis_core::text::decode_euc_kr;
use lis_core::{LisError, Result};

// 行 → 域模型的手工映射。遗留文本列在SQL里convert成varbinary取出，
// 绕过驱动的字符集翻译，再在网关侧按EUC-KR解码。

/// scnumeric联查行 → CBC结果行
pub(crate) fn map_cbc_row(row: &Row) -> Result<CbcResultRow> {
    Ok(CbcResultRow {
        exam_ymd_unit: get_string(row, "exam_ymd_unit")?.unwrap_or_default(),
        slip: get_string(row, "slip")?.unwrap_or_default(),
        wrk_no: get_i32(row, "wrk_no")?.unwrap_or_default(),
        exam_cd: get_string(row, "exam_cd")?.unwrap_or_default(),
        spc: get_string(row, "spc")?.unwrap_or_default(),
        pt_no: get_string(row, "pt_no")?.unwrap_or_default(),
        rslt_typ: get_string(row, "rslt_typ")?,
        text_rslt: get_legacy_text(row, "text_rslt")?,
        numeric_rslt: get_f64(row, "numeric_rslt")?,
        unit: get_string(row, "unit")?,
        rslt_stus: get_string(row, "rslt_stus")?,
        ref_stus: get_string(row, "ref_stus")?,
        pt_nm: get_legacy_text(row, "pt_nm")?,
        sex: get_string(row, "sex")?,
        age: get_i32(row, "age")?,
    })
}

/// scacceptance投影行 → 图像元数据行
pub(crate) fn map_image_row(row: &Row) -> Result<ImageMetaRow> {
    Ok(ImageMetaRow {
        exam_ymd_unit: get_string(row, "exam_ymd_unit")?.unwrap_or_default(),
        slip: get_string(row, "slip")?.unwrap_or_default(),
        wrk_no: get_i32(row, "wrk_no")?.unwrap_or_default(),
        exam_cd: get_string(row, "exam_cd")?,
        spc: get_string(row, "spc")?.unwrap_or_default(),
    })
}

/// CHAR列带尾随空格，读出时裁掉
pub(crate) fn get_string(row: &Row, col: &str) -> Result<Option<String>> {
    row.try_get::<&str, _>(col)
        .map(|v| v.map(|s| s.trim_end().to_string()))
        .map_err(|e| LisError::Database(format!("column {}: {}", col, e)))
}

/// 遗留文本列: 按原始字节读出后在网关侧解码
pub(crate) fn get_legacy_text(row: &Row, col: &str) -> Result<Option<String>> {
    row.try_get::<&[u8], _>(col)
        .map(|v| v.map(|bytes| decode_euc_kr(bytes).trim_end().to_string()))
        .map_err(|e| LisError::Database(format!("column {}: {}", col, e)))
}

pub(crate) fn get_i32(row: &Row, col: &str) -> Result<Option<i32>> {
    row.try_get::<i32, _>(col)
        .map_err(|e| LisError::Database(format!("column {}: {}", col, e)))
}

pub(crate) fn get_f64(row: &Row, col: &str) -> Result<Option<f64>> {
    row.try_get::<f64, _>(col)
        .map_err(|e| LisError::Database(format!("column {}: {}", col, e)))
}
