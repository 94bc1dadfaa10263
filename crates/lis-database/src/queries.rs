//! 数据库查询操作
//!
//! 遗留Sybase库的语句以字面SQL保留 (spo..前缀、convert写法)，仅做参数化。

use tracing::debug;

use lis_core::models::{CbcResultRow, ExamStatus, ImageMetaRow, ImageUpdate, NumericUpdate};
use lis_core::text::encode_euc_kr;
use lis_core::{LisError, Result};

use crate::connection::DbClient;
use crate::models::{get_string, map_cbc_row, map_image_row};

/// CBC面板的固定检验项目代码
pub const CBC_EXAM_CODES: &[&str] = &[
    "L70001", "L70002", "L70003", "L70004", "L70005", "L70006", "L70081",
];

const PATIENT_FOR_SAMPLE_SQL: &str = "SELECT pt_no FROM spo..scacceptance WHERE smp_no = @P1";

const LATEST_PRIOR_SAMPLE_SQL: &str = "SELECT TOP 1 smp_no \
     FROM spo..scacceptance \
     WHERE pt_no = @P1 AND smp_no <> @P2 \
     ORDER BY exam_ymd_unit DESC, wrk_no DESC";

const IMAGE_META_SQL: &str = "SELECT a.exam_ymd_unit, a.slip, a.wrk_no, \
            (SELECT MAX(x.exam_cd) FROM spo..scimage x WHERE x.smp_no = a.smp_no) AS exam_cd, \
            a.spc \
     FROM spo..scacceptance a \
     WHERE a.smp_no = @P1";

const ACCEPTANCE_STATUS_SQL: &str =
    "SELECT exam_stus FROM spo..scacceptance WHERE smp_no = @P1";

const SAVE_IMAGE_SQL: &str = "UPDATE spo..scimage \
     SET size = @P1, image_rslt = @P2, width = @P3, height = @P4, rslt_stus = @P5 \
     WHERE exam_ymd_unit = @P6 AND slip = @P7 AND wrk_no = @P8 AND exam_cd = @P9 AND spc = @P10";

const UPDATE_TEXT_RESULT_SQL: &str = "UPDATE spo..scnumeric \
     SET text_rslt = convert(varchar(255), @P1) \
     FROM spo..scnumeric num \
     JOIN spo..scacceptance acc ON num.exam_ymd_unit = acc.exam_ymd_unit \
                               AND num.slip = acc.slip \
                               AND num.wrk_no = acc.wrk_no \
     WHERE num.smp_no = @P2";

const UPDATE_NUMERIC_SQL: &str = "UPDATE spo..scnumeric \
     SET numeric_rslt = @P1, text_rslt = convert(varchar(255), @P2), unit = @P3, \
         rslt_stus = @P4, ref_stus = @P5, eqp_cd = @P6, eqp_no = @P7 \
     WHERE exam_ymd_unit = @P8 AND slip = @P9 AND wrk_no = @P10 AND exam_cd = @P11 AND spc = @P12";

const UPDATE_ACCEPTANCE_SQL: &str =
    "UPDATE spo..scacceptance SET exam_stus = @P1, eqp_cd = @P2 WHERE smp_no = @P3";

/// 结果检索基础语句
///
/// 遗留文本列convert成varbinary取出，避开服务器端字符集翻译;
/// slip过滤按需拼接，参数始终走占位符。
fn cbc_results_sql(with_slip: bool) -> String {
    let mut sql = String::from(
        "SELECT num.exam_ymd_unit, num.slip, num.wrk_no, num.exam_cd, num.spc, num.pt_no, \
                num.rslt_typ, convert(varbinary(255), num.text_rslt) AS text_rslt, \
                num.numeric_rslt, num.unit, num.rslt_stus, num.ref_stus, \
                convert(varbinary(60), pt.pt_nm) AS pt_nm, acc.sex, acc.age \
         FROM spo..scnumeric num \
         JOIN spo..scacceptance acc ON acc.smp_no = num.smp_no \
         JOIN spo..v_osmp_patient pt ON acc.pt_no = pt.pt_no \
         WHERE num.smp_no = @P1",
    );
    sql.push_str(" AND num.exam_cd IN (");
    sql.push_str(&quoted_exam_codes());
    sql.push(')');
    if with_slip {
        sql.push_str(" AND num.slip = @P2");
    }
    sql
}

fn quoted_exam_codes() -> String {
    CBC_EXAM_CODES
        .iter()
        .map(|code| format!("'{}'", code))
        .collect::<Vec<_>>()
        .join(", ")
}

/// 数据库查询操作接口
pub struct LisQueries<'a> {
    client: &'a mut DbClient,
}

impl<'a> LisQueries<'a> {
    pub fn new(client: &'a mut DbClient) -> Self {
        Self { client }
    }

    // ========== 结果检索 ==========

    /// 按样本号检索CBC结果, slip存在时附加结果单过滤
    pub async fn fetch_cbc_results(
        &mut self,
        smp_no: &str,
        slip: Option<&str>,
    ) -> Result<Vec<CbcResultRow>> {
        let sql = cbc_results_sql(slip.is_some());
        debug!("fetch_cbc_results smp_no={}", smp_no);

        let stream = match slip {
            Some(slip) => self.client.query(sql, &[&smp_no, &slip]).await,
            None => self.client.query(sql, &[&smp_no]).await,
        }
        .map_err(|e| LisError::Database(e.to_string()))?;

        let rows = stream
            .into_first_result()
            .await
            .map_err(|e| LisError::Database(e.to_string()))?;

        rows.iter().map(map_cbc_row).collect()
    }

    /// 同一患者最近一次既往样本 (直接命中为空时的回退)
    pub async fn fetch_latest_prior_sample(&mut self, smp_no: &str) -> Result<Option<String>> {
        let rows = self
            .client
            .query(PATIENT_FOR_SAMPLE_SQL, &[&smp_no])
            .await
            .map_err(|e| LisError::Database(e.to_string()))?
            .into_first_result()
            .await
            .map_err(|e| LisError::Database(e.to_string()))?;

        let pt_no = match rows.first() {
            Some(row) => match get_string(row, "pt_no")? {
                Some(pt_no) => pt_no,
                None => return Ok(None),
            },
            None => return Ok(None),
        };

        let rows = self
            .client
            .query(LATEST_PRIOR_SAMPLE_SQL, &[&pt_no, &smp_no])
            .await
            .map_err(|e| LisError::Database(e.to_string()))?
            .into_first_result()
            .await
            .map_err(|e| LisError::Database(e.to_string()))?;

        match rows.first() {
            Some(row) => get_string(row, "smp_no"),
            None => Ok(None),
        }
    }

    /// 按样本号检索图像元数据 (不含图像本体)
    pub async fn fetch_image_meta(&mut self, smp_no: &str) -> Result<Vec<ImageMetaRow>> {
        let rows = self
            .client
            .query(IMAGE_META_SQL, &[&smp_no])
            .await
            .map_err(|e| LisError::Database(e.to_string()))?
            .into_first_result()
            .await
            .map_err(|e| LisError::Database(e.to_string()))?;

        rows.iter().map(map_image_row).collect()
    }

    /// 读取验收记录状态; 样本不存在时返回None
    pub async fn fetch_acceptance_status(&mut self, smp_no: &str) -> Result<Option<ExamStatus>> {
        let rows = self
            .client
            .query(ACCEPTANCE_STATUS_SQL, &[&smp_no])
            .await
            .map_err(|e| LisError::Database(e.to_string()))?
            .into_first_result()
            .await
            .map_err(|e| LisError::Database(e.to_string()))?;

        match rows.first() {
            Some(row) => Ok(get_string(row, "exam_stus")?
                .map(|flag| ExamStatus::from_flag(&flag))),
            None => Ok(None),
        }
    }

    // ========== 结果保存 ==========

    /// 按复合键无条件更新图像行, 返回受影响行数
    pub async fn save_image_result(&mut self, update: &ImageUpdate) -> Result<u64> {
        let image: &[u8] = &update.image_rslt;
        let result = self
            .client
            .execute(
                SAVE_IMAGE_SQL,
                &[
                    &update.size,
                    &image,
                    &update.width,
                    &update.height,
                    &update.rslt_stus,
                    &update.key.exam_ymd_unit,
                    &update.key.slip,
                    &update.key.wrk_no,
                    &update.key.exam_cd,
                    &update.key.spc,
                ],
            )
            .await
            .map_err(|e| LisError::Database(e.to_string()))?;

        let total = result.total();
        debug!("save_image_result affected {} rows", total);
        Ok(total)
    }

    /// 更新文本结果; 出站文本编码回EUC-KR, 整体在事务内执行
    pub async fn save_text_result(&mut self, smp_no: &str, text_rslt: &str) -> Result<u64> {
        let text = encode_euc_kr(text_rslt)?;
        let text_param: &[u8] = &text;

        self.begin().await?;
        let outcome = self
            .client
            .execute(UPDATE_TEXT_RESULT_SQL, &[&text_param, &smp_no])
            .await;

        match outcome {
            Ok(result) => {
                self.commit().await?;
                Ok(result.total())
            }
            Err(e) => {
                self.rollback().await;
                Err(LisError::Database(e.to_string()))
            }
        }
    }

    /// 全量数值结果保存: 结果行与验收行的两次更新共享一个事务
    pub async fn save_numeric_result(&mut self, update: &NumericUpdate) -> Result<u64> {
        let text_param = match update.text_rslt.as_deref() {
            Some(text) => Some(encode_euc_kr(text)?),
            None => None,
        };

        self.begin().await?;
        let outcome = async {
            let numeric = self
                .client
                .execute(
                    UPDATE_NUMERIC_SQL,
                    &[
                        &update.numeric_rslt,
                        &text_param,
                        &update.unit,
                        &update.rslt_stus,
                        &update.ref_stus,
                        &update.eqp_cd,
                        &update.eqp_no,
                        &update.key.exam_ymd_unit,
                        &update.key.slip,
                        &update.key.wrk_no,
                        &update.key.exam_cd,
                        &update.key.spc,
                    ],
                )
                .await?;
            self.client
                .execute(
                    UPDATE_ACCEPTANCE_SQL,
                    &[&update.exam_stus, &update.eqp_cd, &update.smp_no],
                )
                .await?;
            Ok::<u64, tiberius::error::Error>(numeric.total())
        }
        .await;

        match outcome {
            Ok(rows) => {
                self.commit().await?;
                Ok(rows)
            }
            Err(e) => {
                self.rollback().await;
                Err(LisError::Database(e.to_string()))
            }
        }
    }

    // ========== 事务控制 ==========

    async fn begin(&mut self) -> Result<()> {
        self.run_simple("BEGIN TRANSACTION").await
    }

    async fn commit(&mut self) -> Result<()> {
        self.run_simple("COMMIT TRANSACTION").await
    }

    /// 回滚尽力而为; 连接随请求结束关闭, 服务器端也会放弃未决事务
    async fn rollback(&mut self) {
        if let Err(e) = self.run_simple("ROLLBACK TRANSACTION").await {
            tracing::warn!("rollback failed: {}", e);
        }
    }

    async fn run_simple(&mut self, sql: &'static str) -> Result<()> {
        self.client
            .simple_query(sql)
            .await
            .map_err(|e| LisError::Database(format!("{}: {}", sql, e)))?
            .into_results()
            .await
            .map_err(|e| LisError::Database(format!("{}: {}", sql, e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cbc_results_sql_without_slip() {
        let sql = cbc_results_sql(false);
        assert!(sql.contains("WHERE num.smp_no = @P1"));
        assert!(sql.contains("AND num.exam_cd IN ('L70001'"));
        assert!(!sql.contains("@P2"));
    }

    #[test]
    fn test_cbc_results_sql_with_slip() {
        let sql = cbc_results_sql(true);
        assert!(sql.ends_with("AND num.slip = @P2"));
    }

    #[test]
    fn test_legacy_text_fetched_as_binary() {
        // 文本列必须绕过驱动字符集翻译
        let sql = cbc_results_sql(false);
        assert!(sql.contains("convert(varbinary(255), num.text_rslt) AS text_rslt"));
        assert!(sql.contains("convert(varbinary(60), pt.pt_nm) AS pt_nm"));
    }

    #[test]
    fn test_image_meta_uses_max_exam_cd() {
        assert!(IMAGE_META_SQL.contains("MAX(x.exam_cd)"));
        assert!(IMAGE_META_SQL.contains("spo..scimage"));
    }

    #[test]
    fn test_update_statements_target_composite_key() {
        for sql in [SAVE_IMAGE_SQL, UPDATE_NUMERIC_SQL] {
            assert!(sql.contains("exam_ymd_unit ="));
            assert!(sql.contains("AND slip ="));
            assert!(sql.contains("AND wrk_no ="));
            assert!(sql.contains("AND exam_cd ="));
            assert!(sql.contains("AND spc ="));
        }
    }
}
