use anyhow::{Context as _, Result, bail};
use clap::{Parser, Subcommand};
use fanout_mq::{
    Context, FanoutConfig, InMemoryClusters, Message, Reader, ReaderConfig, WriteMode, Writer,
    WriterConfig,
};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "fanout-mq")]
#[command(about = "Multi-cluster message queue fan-in reader and failover writer")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a JSON cluster config
    CheckConfig {
        #[arg(long)]
        config: PathBuf,
    },
    /// Run a writer and reader over in-memory clusters
    Simulate {
        #[arg(long, default_value_t = 3)]
        clusters: usize,
        #[arg(long, default_value_t = WriteMode::MultiWrite)]
        mode: WriteMode,
        #[arg(long, default_value_t = 10)]
        messages: usize,
        /// Index of a cluster to take down (repeatable)
        #[arg(long)]
        down: Vec<usize>,
        #[arg(long, default_value = "events")]
        topic: String,
        /// Per-read timeout in milliseconds
        #[arg(long, default_value_t = 2000)]
        timeout_ms: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::CheckConfig { config } => check_config(&config),
        Command::Simulate {
            clusters,
            mode,
            messages,
            down,
            topic,
            timeout_ms,
        } => {
            simulate(
                clusters,
                mode,
                messages,
                &down,
                &topic,
                Duration::from_millis(timeout_ms),
            )
            .await
        }
    }
}

fn check_config(path: &Path) -> Result<()> {
    let config = FanoutConfig::load(path)
        .with_context(|| format!("invalid config {}", path.display()))?;

    println!("Config OK: {}", path.display());
    println!("  write mode: {}", config.mode);
    for (index, reader) in config.readers.iter().enumerate() {
        println!("  reader[{}]: {}", index, reader.to_url());
    }
    for (index, writer) in config.writers.iter().enumerate() {
        println!("  writer[{}]: {}", index, writer.to_url());
    }
    Ok(())
}

async fn simulate(
    cluster_count: usize,
    mode: WriteMode,
    message_count: usize,
    down: &[usize],
    topic: &str,
    read_timeout: Duration,
) -> Result<()> {
    if cluster_count == 0 {
        bail!("--clusters must be at least 1");
    }
    if let Some(index) = down.iter().find(|&&index| index >= cluster_count) {
        bail!("--down {} is out of range for {} clusters", index, cluster_count);
    }

    let registry = InMemoryClusters::new();
    let mut reader_configs = Vec::with_capacity(cluster_count);
    let mut writer_configs = Vec::with_capacity(cluster_count);
    for index in 0..cluster_count {
        let broker = format!("sim-{}:9092", index);
        let cluster = registry.create(&broker).await?;
        if down.contains(&index) {
            cluster.faults().set_unavailable(true);
        }
        reader_configs.push(ReaderConfig::new(&[broker.as_str()], topic).group_id("simulate"));
        writer_configs.push(WriterConfig::new(&[broker.as_str()], topic));
    }

    let writer = Writer::new(mode, writer_configs, &registry).await?;
    let reader = Reader::new(reader_configs, &registry).await?;
    let ctx = Context::background();

    let mut written = 0usize;
    for i in 0..message_count {
        let message = Message::new(format!("key-{}", i), format!("simulated message {}", i));
        match writer.write_messages(&ctx, &[message]).await {
            Ok(()) => written += 1,
            Err(err) => println!("write {} failed: {}", i, err),
        }
    }

    let mut received = 0usize;
    while received < written {
        let read_ctx = ctx.with_timeout(read_timeout);
        match reader.read_message(&read_ctx).await {
            Ok(messages) => received += messages.len(),
            Err(err) => {
                println!("read stopped: {}", err);
                break;
            }
        }
    }

    println!(
        "mode {}: {} clusters ({} down), {}/{} written, {} received",
        mode,
        cluster_count,
        down.len(),
        written,
        message_count,
        received
    );
    for index in 0..cluster_count {
        println!("  [{}] {}", index, writer.stats(index));
        println!("  [{}] {}", index, reader.stats(index));
    }

    writer.close().await?;
    reader.close().await?;
    Ok(())
}
