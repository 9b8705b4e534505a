//! `helmsman tools` — list the registered tools.

use helmsman_core::Tool as _;

pub fn run() -> anyhow::Result<()> {
    let registry = helmsman_tools::default_registry();

    println!("Available tools:");
    for name in registry.names() {
        let Some(tool) = registry.get(name) else {
            continue;
        };
        println!("  {:<18} [{}]", name, tool.output_kind());
        println!("      {}", tool.description());
    }
    Ok(())
}
