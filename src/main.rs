/*!
 * AI-OS Virtual Memory - Demo Entry Point
 *
 * Builds a memory from the environment and exercises it:
 * - space allocation and typed writes
 * - a copy-on-write transaction
 * - statistics report
 */

use anyhow::Context;
use tracing::info;

use ai_os_vmem::{init_tracing, MemoryConfig, Space};

fn main() -> anyhow::Result<()> {
    // Initialize structured tracing
    init_tracing();

    info!("Virtual memory demo starting...");

    let config = MemoryConfig::from_env().context("loading memory configuration")?;
    info!(kind = %config.kind, size = config.size, max_size = ?config.max_size, "Configuration loaded");

    let memory = config.build().context("building memory")?;

    info!("Allocating spaces...");
    let greeting = memory.allocate(1024).context("allocating greeting space")?;
    greeting.write_string("Hello2")?;
    let scratch = memory.allocate(4096).context("allocating scratch space")?;
    scratch.write(&[0xAB; 4096])?;

    info!("Running transaction...");
    let transaction = greeting.transactional();
    transaction.start()?;
    transaction.write_string("Hi world!")?;
    info!(base = %greeting.read_string()?, "Base before commit");
    transaction.commit()?;
    info!(base = %greeting.read_string()?, "Base after commit");

    let view = greeting.read_only();
    if let Err(e) = view.free() {
        info!(error = %e, "Read-only view rejected free");
    }

    scratch.free()?;
    println!("{}", memory.statistic());

    memory.free();
    info!("Virtual memory demo finished");
    Ok(())
}
