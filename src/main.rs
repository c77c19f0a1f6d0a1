// ==========================================
// DIRBS 数据保留维护 - 命令行入口
// ==========================================
// 用法:
//   dirbs-prune [--db-path <PATH>] [--curr-date YYYYMMDD] triplets
//   dirbs-prune [--db-path <PATH>] [--curr-date YYYYMMDD] classification-state
// ==========================================

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use dirbs_prune::api::{ClassificationPruneRequest, PruneApi, TripletPruneRequest};
use dirbs_prune::config::{ConfigManager, RetentionConfigReader};
use dirbs_prune::db::{ensure_maintenance_schema, get_default_db_path, open_sqlite_connection};
use dirbs_prune::logging;

#[derive(Parser, Debug)]
#[command(version, about = "DIRBS 历史数据裁剪", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// 数据库文件路径
    #[arg(long, global = true, env = "DIRBS_PRUNE_DB_PATH")]
    db_path: Option<String>,

    /// 运行日期（YYYYMMDD），缺省为当天
    #[arg(long, global = true, value_parser = parse_curr_date)]
    curr_date: Option<NaiveDate>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 删除保留窗口之外的月度三元组分区
    Triplets,
    /// 重建 classification_state，只保留窗口内且条件仍启用的行
    ClassificationState,
}

fn parse_curr_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, "%Y%m%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .map_err(|e| format!("无法解析日期 {:?}（期望 YYYYMMDD）: {}", raw, e))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let cli = Cli::parse();

    tracing::info!("==================================================");
    tracing::info!("{} v{}", dirbs_prune::APP_NAME, dirbs_prune::VERSION);
    tracing::info!("==================================================");

    let db_path = cli.db_path.clone().unwrap_or_else(get_default_db_path);
    tracing::info!("使用数据库: {}", db_path);

    let config = ConfigManager::new(&db_path).context("无法打开配置库")?;
    let policy = config
        .get_retention_policy()
        .await
        .context("保留策略配置非法")?;

    let snapshot = config.get_config_snapshot().context("无法读取配置快照")?;

    let conn = open_sqlite_connection(&db_path).context("无法打开数据库")?;
    ensure_maintenance_schema(&conn)?;
    let api = PruneApi::new(&conn).with_config_snapshot(snapshot);

    let summary = match cli.command {
        Command::Triplets => {
            let request = TripletPruneRequest::monthly_network_triplets(cli.curr_date, policy);
            let report = api.prune_historical_partitions(&request)?;
            serde_json::to_string_pretty(&report)?
        }
        Command::ClassificationState => {
            let active_conditions = config
                .get_active_conditions()
                .await
                .context("条件配置非法")?;
            let request = ClassificationPruneRequest {
                curr_date: cli.curr_date,
                policy,
                active_conditions,
            };
            let report = api.prune_stale_classification_state(&request)?;
            serde_json::to_string_pretty(&report)?
        }
    };

    println!("{}", summary);
    Ok(())
}
