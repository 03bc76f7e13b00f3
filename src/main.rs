use std::path::PathBuf;

use anyhow::{bail, Result};
use quiz_pipeline::app::{App, InputSource};
use quiz_pipeline::config::Config;
use quiz_pipeline::utils::logging;

/// 配置文件路径的环境变量
const CONFIG_ENV: &str = "QUIZ_PIPELINE_CONFIG";

const USAGE: &str = "用法: quiz_pipeline [--text] <文件> [标题]";

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 加载配置
    let config = match std::env::var(CONFIG_ENV) {
        Ok(path) => Config::from_toml_file(path)?,
        Err(_) => Config::from_env(),
    };

    // 初始化日志
    logging::init(config.verbose_logging);

    let input = parse_args(std::env::args().skip(1).collect())?;

    // 初始化并运行应用
    App::initialize(config).await?.run(input).await?;

    Ok(())
}

fn parse_args(args: Vec<String>) -> Result<InputSource> {
    let mut args = args.into_iter().peekable();
    let as_text = args.next_if(|a| a == "--text").is_some();

    let Some(path) = args.next() else {
        bail!("{}", USAGE);
    };
    let path = PathBuf::from(path);
    let title = args.next();

    Ok(if as_text {
        InputSource::Text { path, title }
    } else {
        InputSource::File { path, title }
    })
}
