//! `genforge stacks`: list the built-in project stacks.

use anyhow::Result;
use console::style;

pub fn cmd_stacks(json: bool) -> Result<()> {
    use genforge::generation::StackRegistry;

    let stacks = StackRegistry::builtin();

    if json {
        let listing: Vec<serde_json::Value> = stacks
            .iter()
            .map(|stack| {
                serde_json::json!({
                    "id": stack.id,
                    "description": stack.description,
                    "language": stack.language,
                    "manifest": stack.manifest,
                    "componentDir": stack.component_dir,
                    "defaultFiles": stack.default_files,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    for stack in stacks.iter() {
        println!("{}  {}", style(stack.id).bold(), stack.description);
        println!(
            "    components: {}/*.{}",
            stack.component_dir, stack.component_extension
        );
        println!("    files: {}", stack.default_files.join(", "));
    }
    Ok(())
}
