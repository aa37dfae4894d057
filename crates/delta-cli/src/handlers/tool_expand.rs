use std::path::PathBuf;

use anyhow::Result;

use delta_types::{InjectAs, ToolDefinition};

pub fn handle(path: PathBuf) -> Result<i32> {
    let tools = delta_config::load_tools_file(&path)?;
    for (idx, tool) in tools.iter().enumerate() {
        if idx > 0 {
            println!();
        }
        print!("{}", render(tool));
    }
    Ok(0)
}

/// Deterministic, directly printable view of a normalized tool.
fn render(tool: &ToolDefinition) -> String {
    let mut out = String::new();
    out.push_str(&format!("tool: {} ({})\n", tool.name, tool.syntax.as_str()));
    if !tool.description.is_empty() {
        out.push_str(&format!("  description: {}\n", tool.description));
    }
    out.push_str(&format!(
        "  argv: [{}]\n",
        tool.argv_template
            .iter()
            .map(|a| format!("{:?}", a))
            .collect::<Vec<_>>()
            .join(", ")
    ));
    if tool.parameters.is_empty() {
        out.push_str("  parameters: (none)\n");
    } else {
        out.push_str("  parameters:\n");
        for param in &tool.parameters {
            let mut attrs = vec![inject_label(param.inject_as).to_string()];
            if let Some(pos) = param.position {
                attrs.push(format!("position {}", pos));
            }
            if let Some(name) = &param.option_name {
                attrs.push(format!("option_name {}", name));
            }
            if param.raw {
                attrs.push("raw".to_string());
            }
            attrs.push(if param.required {
                "required".to_string()
            } else {
                "optional".to_string()
            });
            if let Some(default) = &param.default {
                attrs.push(format!("default {:?}", default));
            }
            out.push_str(&format!("    - {} ({})\n", param.name, attrs.join(", ")));
            if let Some(desc) = &param.description {
                out.push_str(&format!("      {}\n", desc));
            }
        }
    }
    if let Some(stdin) = &tool.stdin_param {
        out.push_str(&format!("  stdin: {}\n", stdin));
    }
    out
}

fn inject_label(inject_as: InjectAs) -> &'static str {
    match inject_as {
        InjectAs::Argument => "argument",
        InjectAs::Stdin => "stdin",
        InjectAs::Option => "option",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use delta_config::{RawTool, expand_tool};

    #[test]
    fn test_render_is_deterministic() {
        let tool = expand_tool(&RawTool {
            name: "count_lines".to_string(),
            description: "Count lines in a file".to_string(),
            exec: None,
            shell: Some("cat ${file} | wc -l".to_string()),
            command: None,
            stdin: None,
            parameters: Vec::new(),
        })
        .unwrap();

        let first = render(&tool);
        let second = render(&tool);
        assert_eq!(first, second);
        assert!(first.contains("tool: count_lines (shell)"));
        assert!(first.contains("\"sh\", \"-c\""));
        assert!(first.contains("- file (argument, position 0, required)"));
    }
}
