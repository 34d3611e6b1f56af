//! 规则步骤
//!
//! 逐行读取输入，转换为字段集合交给评估器，把被修改的字段写回行，
//! 追加汇总列写到主输出，按输出模式把规则结果写到详细输出。
//! 任何错误都会终止整个行流。

use crate::bridge;
use crate::config::{StepConfig, Variables};
use crate::error::{Result, StepError};
use crate::evaluator::RowEvaluator;
use crate::output;
use crate::schema::{ColumnSchema, Row};
use rowrule_shared::observability::metrics;
use tracing::{debug, error, info};

/// 行输入
pub trait RowSource {
    fn next_row(&mut self) -> Option<Row>;
}

impl<I> RowSource for I
where
    I: Iterator<Item = Row>,
{
    fn next_row(&mut self) -> Option<Row> {
        self.next()
    }
}

/// 行输出
pub trait RowSink {
    fn put_row(&mut self, row: Row) -> Result<()>;

    /// 输入结束或出错后调用
    fn close(&mut self) {}
}

impl RowSink for Vec<Row> {
    fn put_row(&mut self, row: Row) -> Result<()> {
        self.push(row);
        Ok(())
    }
}

/// 步骤运行统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepReport {
    pub rows_read: u64,
    pub rows_written: u64,
    pub detail_rows_written: u64,
    pub errors: u64,
}

/// 规则步骤实例
pub struct RuleStep {
    config: StepConfig,
    schema: ColumnSchema,
    summary_schema: ColumnSchema,
    detail_schema: Option<ColumnSchema>,
    evaluator: Box<dyn RowEvaluator>,
    initialized: bool,
    report: StepReport,
}

impl RuleStep {
    /// 按配置构造步骤，评估器在第一行到达时才初始化
    pub fn new(config: StepConfig, schema: ColumnSchema, variables: &Variables) -> Result<Self> {
        let evaluator = config.build_evaluator(variables)?;
        Self::with_evaluator(config, schema, evaluator)
    }

    pub fn with_evaluator(
        config: StepConfig,
        schema: ColumnSchema,
        evaluator: Box<dyn RowEvaluator>,
    ) -> Result<Self> {
        if config.main_target.trim().is_empty() {
            return Err(StepError::Configuration("未定义主输出目标".to_string()));
        }

        let summary_schema = output::summary_schema(&schema)?;
        let detail_schema = if config.detail_enabled() {
            Some(output::detail_schema(&schema)?)
        } else {
            None
        };

        Ok(Self {
            config,
            schema,
            summary_schema,
            detail_schema,
            evaluator,
            initialized: false,
            report: StepReport::default(),
        })
    }

    pub fn input_schema(&self) -> &ColumnSchema {
        &self.schema
    }

    /// 主输出列定义
    pub fn summary_schema(&self) -> &ColumnSchema {
        &self.summary_schema
    }

    /// 详细输出列定义，未启用详细输出时为 None
    pub fn detail_schema(&self) -> Option<&ColumnSchema> {
        self.detail_schema.as_ref()
    }

    pub fn report(&self) -> &StepReport {
        &self.report
    }

    /// 处理全部输入行
    ///
    /// 出错时记录一个错误，释放评估器，关闭输出并返回错误，正在处理的行不会输出。
    pub async fn run(
        &mut self,
        source: &mut dyn RowSource,
        main: &mut dyn RowSink,
        mut detail: Option<&mut dyn RowSink>,
    ) -> Result<StepReport> {
        while let Some(row) = source.next_row() {
            self.report.rows_read += 1;

            let detail_sink = detail.as_mut().map(|sink| &mut **sink as &mut dyn RowSink);
            if let Err(e) = self.process_row(row, main, detail_sink).await {
                self.report.errors += 1;
                metrics::record_step_row(self.evaluator.mode_name(), "error");
                error!(
                    row = self.report.rows_read,
                    code = e.code(),
                    error = %e,
                    "规则步骤执行失败，停止处理"
                );
                self.finish(main, detail).await;
                return Err(e);
            }
        }

        self.finish(main, detail).await;
        info!(
            mode = self.evaluator.mode_name(),
            rows_read = self.report.rows_read,
            rows_written = self.report.rows_written,
            detail_rows_written = self.report.detail_rows_written,
            "规则步骤处理完成"
        );
        Ok(self.report)
    }

    async fn process_row(
        &mut self,
        row: Row,
        main: &mut dyn RowSink,
        detail: Option<&mut dyn RowSink>,
    ) -> Result<()> {
        if row.len() != self.schema.len() {
            return Err(StepError::Schema(format!(
                "第 {} 行有 {} 列，列定义为 {} 列",
                self.report.rows_read,
                row.len(),
                self.schema.len()
            )));
        }

        if !self.initialized {
            self.evaluator.initialize(&self.schema).await?;
            self.initialized = true;
            info!(
                mode = self.evaluator.mode_name(),
                output_mode = %self.config.output_mode,
                detail = self.detail_schema.is_some(),
                "评估器已初始化"
            );
        }

        let label = format!("row number: {}", self.report.rows_read);
        let mut fields = bridge::to_field_collection(&self.schema, &row)?;
        let verdict = self.evaluator.evaluate(&label, &mut fields).await?;
        debug!(
            label = %label,
            groups_failed = verdict.summary.groups_failed,
            rules_failed = verdict.summary.rules_failed,
            updated = fields.updated_count(),
            "行评估结果"
        );

        let row = bridge::from_field_collection(&self.schema, row, &fields)?;

        let details = match (&self.detail_schema, detail) {
            (Some(_), Some(sink)) => {
                Some((sink, output::detail_rows(&row, &verdict.groups, self.config.output_mode)))
            }
            _ => None,
        };

        main.put_row(output::append_summary(row, &verdict.summary))?;
        self.report.rows_written += 1;

        if let Some((sink, rows)) = details {
            for detail_row in rows {
                sink.put_row(detail_row)?;
                self.report.detail_rows_written += 1;
            }
        }

        self.evaluator.row_complete().await;
        metrics::record_step_row(self.evaluator.mode_name(), "ok");
        Ok(())
    }

    async fn finish(&mut self, main: &mut dyn RowSink, detail: Option<&mut dyn RowSink>) {
        self.evaluator.shutdown().await;
        main.close();
        if let Some(sink) = detail {
            sink.close();
        }
    }
}
