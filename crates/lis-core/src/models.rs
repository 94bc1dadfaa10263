//! 核心数据模型定义

use serde::{Deserialize, Serialize};

/// CBC结果行 (scnumeric × scacceptance × v_osmp_patient 投影)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CbcResultRow {
    pub exam_ymd_unit: String,     // 检验日期-单元键
    pub slip: String,              // 结果单代码
    pub wrk_no: i32,               // 工作号
    pub exam_cd: String,           // 检验项目代码
    pub spc: String,               // 标本代码
    pub pt_no: String,             // 患者号
    pub rslt_typ: Option<String>,  // 结果类型 (数值/文本)
    pub text_rslt: Option<String>, // 文本结果, 已解码为UTF-8
    pub numeric_rslt: Option<f64>, // 数值结果
    pub unit: Option<String>,      // 单位
    pub rslt_stus: Option<String>, // 结果状态
    pub ref_stus: Option<String>,  // 参考范围状态
    pub pt_nm: Option<String>,     // 患者姓名, 已解码为UTF-8
    pub sex: Option<String>,       // 性别
    pub age: Option<i32>,          // 年龄
}

/// 图像元数据行
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageMetaRow {
    pub exam_ymd_unit: String,
    pub slip: String,
    pub wrk_no: i32,
    pub exam_cd: Option<String>, // 该样本scimage中最大的检验项目代码
    pub spc: String,
}

/// 结果复合键
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultKey {
    pub exam_ymd_unit: String,
    pub slip: String,
    pub wrk_no: i32,
    pub exam_cd: String,
    pub spc: String,
}

/// 图像保存载荷, image_rslt已还原为二进制
#[derive(Debug, Clone)]
pub struct ImageUpdate {
    pub key: ResultKey,
    pub size: i32,
    pub width: i32,
    pub height: i32,
    pub rslt_stus: String,
    pub image_rslt: Vec<u8>,
}

/// 全量数值结果保存载荷 (设备回传)
#[derive(Debug, Clone)]
pub struct NumericUpdate {
    pub key: ResultKey,
    pub smp_no: String,
    pub numeric_rslt: Option<f64>,
    pub text_rslt: Option<String>,
    pub unit: Option<String>,
    pub rslt_stus: String,
    pub ref_stus: Option<String>,
    pub eqp_cd: String,    // 设备代码
    pub eqp_no: String,    // 设备号
    pub exam_stus: String, // 写回验收记录的状态
}

/// 验收记录状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExamStatus {
    /// 已终审, 不可再修改
    Final,
    /// 仍可编辑
    Editable,
}

impl ExamStatus {
    /// 从scacceptance.exam_stus的原始标志解析
    pub fn from_flag(flag: &str) -> Self {
        if flag.trim() == "F" {
            ExamStatus::Final
        } else {
            ExamStatus::Editable
        }
    }

    pub fn is_final(self) -> bool {
        matches!(self, ExamStatus::Final)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exam_status_from_flag() {
        assert!(ExamStatus::from_flag("F").is_final());
        // CHAR列带尾随空格
        assert!(ExamStatus::from_flag("F ").is_final());
        assert!(!ExamStatus::from_flag("D").is_final());
        assert!(!ExamStatus::from_flag("").is_final());
    }
}
