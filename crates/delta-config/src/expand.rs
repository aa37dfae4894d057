//! Declarative tool expansion.
//!
//! Converts the three declarative tool forms into the normalized internal
//! form: a safe argv template plus a flat parameter manifest.
//!
//! ```text
//! exec:  "echo ${message}"          -> ["echo", "${message}"]
//! shell: "cat ${file} | wc -l"      -> ["sh", "-c", "cat \"$1\" | wc -l", "--"]
//! command: ["python3", "run.py"]    -> verbatim argv, parameters appended
//! ```
//!
//! Parameter values are substituted per argv element at execution time and
//! never re-parsed by a shell, so a value cannot introduce new argv words.

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

use delta_types::{InjectAs, ToolDefinition, ToolParameter, ToolSyntax};

#[cfg(test)]
use crate::schema::RawParameter;
use crate::schema::RawTool;
use crate::{Error, Result};

/// Shell metacharacters rejected outside quotes in `exec:` templates
const EXEC_METACHARACTERS: &[char] = &['|', '>', '<', '&', ';'];

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(:raw)?\}").unwrap())
}

/// Expand one declarative tool into its normalized form.
pub fn expand_tool(raw: &RawTool) -> Result<ToolDefinition> {
    let syntax = detect_syntax(raw)?;

    let mut tool = match syntax {
        ToolSyntax::Exec => expand_exec(raw)?,
        ToolSyntax::Shell => expand_shell(raw)?,
        ToolSyntax::Command => expand_command(raw)?,
    };

    apply_stdin_shorthand(raw, &mut tool)?;
    validate_structure(&tool)?;
    Ok(tool)
}

fn detect_syntax(raw: &RawTool) -> Result<ToolSyntax> {
    let mut present = Vec::new();
    if raw.exec.is_some() {
        present.push(ToolSyntax::Exec);
    }
    if raw.shell.is_some() {
        present.push(ToolSyntax::Shell);
    }
    if raw.command.is_some() {
        present.push(ToolSyntax::Command);
    }
    match present.as_slice() {
        [one] => Ok(*one),
        [] => Err(Error::InvalidTool {
            tool: raw.name.clone(),
            message: "exactly one of exec:, shell:, command: is required".to_string(),
        }),
        many => Err(Error::InvalidTool {
            tool: raw.name.clone(),
            message: format!(
                "multiple syntaxes given ({}); exactly one of exec:, shell:, command: is allowed",
                many.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
            ),
        }),
    }
}

/// Placeholder occurrence collected during the inference pass
struct Placeholder {
    name: String,
    raw: bool,
}

fn collect_placeholders(tool: &str, text: &str) -> Result<Vec<Placeholder>> {
    let mut out: Vec<Placeholder> = Vec::new();
    for caps in placeholder_re().captures_iter(text) {
        let name = caps[1].to_string();
        let raw = caps.get(2).is_some();
        if let Some(first) = out.iter().find(|p| p.name == name) {
            if first.raw != raw {
                return Err(Error::InvalidTool {
                    tool: tool.to_string(),
                    message: format!(
                        "placeholder ${{{}}} appears both with and without :raw",
                        name
                    ),
                });
            }
            continue;
        }
        out.push(Placeholder { name, raw });
    }
    Ok(out)
}

// --- exec ---

fn expand_exec(raw: &RawTool) -> Result<ToolDefinition> {
    let template = raw.exec.as_deref().unwrap_or_default();

    reject_unquoted_metacharacters(&raw.name, template)?;

    let tokens = shlex::split(template).ok_or_else(|| Error::InvalidTool {
        tool: raw.name.clone(),
        message: "unbalanced quoting in exec template".to_string(),
    })?;
    if tokens.is_empty() {
        return Err(Error::InvalidTool {
            tool: raw.name.clone(),
            message: "exec template is empty".to_string(),
        });
    }

    let placeholders = collect_placeholders(&raw.name, &tokens.join("\u{0}"))?;
    if let Some(p) = placeholders.iter().find(|p| p.raw) {
        return Err(Error::InvalidTool {
            tool: raw.name.clone(),
            message: format!(
                "placeholder ${{{}:raw}}: the :raw modifier is only valid in shell: templates",
                p.name
            ),
        });
    }

    let mut parameters: Vec<ToolParameter> = placeholders
        .iter()
        .enumerate()
        .map(|(idx, p)| inferred_parameter(&p.name, idx, false))
        .collect();

    merge_explicit_block(raw, &mut parameters)?;

    Ok(ToolDefinition {
        name: raw.name.clone(),
        description: raw.description.clone(),
        argv_template: tokens,
        parameters,
        stdin_param: None,
        syntax: ToolSyntax::Exec,
    })
}

/// Scan an exec template for shell metacharacters outside quotes.
///
/// The exec form promises "no shell involved"; a metacharacter in it is
/// almost always a shell: tool written in the wrong syntax.
fn reject_unquoted_metacharacters(tool: &str, template: &str) -> Result<()> {
    let mut in_single = false;
    let mut in_double = false;
    let mut escaped = false;
    for ch in template.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if !in_single => escaped = true,
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            c if !in_single && !in_double && EXEC_METACHARACTERS.contains(&c) => {
                return Err(Error::InvalidTool {
                    tool: tool.to_string(),
                    message: format!(
                        "unquoted shell metacharacter {:?} in exec template; use shell: for pipelines",
                        c
                    ),
                });
            }
            _ => {}
        }
    }
    Ok(())
}

// --- shell ---

fn expand_shell(raw: &RawTool) -> Result<ToolDefinition> {
    let script = raw.shell.as_deref().unwrap_or_default();
    if script.trim().is_empty() {
        return Err(Error::InvalidTool {
            tool: raw.name.clone(),
            message: "shell template is empty".to_string(),
        });
    }

    let placeholders = collect_placeholders(&raw.name, script)?;

    // Rewrite each placeholder into its positional slot. Values travel as
    // argv entries after "--", so `sh` never re-parses them.
    let rewritten = placeholder_re().replace_all(script, |caps: &regex::Captures<'_>| {
        let name = &caps[1];
        let idx = placeholders
            .iter()
            .position(|p| p.name == name)
            .unwrap_or_default();
        if caps.get(2).is_some() {
            format!("${}", idx + 1)
        } else {
            format!("\"${}\"", idx + 1)
        }
    });

    let mut parameters: Vec<ToolParameter> = placeholders
        .iter()
        .enumerate()
        .map(|(idx, p)| inferred_parameter(&p.name, idx, p.raw))
        .collect();

    merge_explicit_block(raw, &mut parameters)?;

    Ok(ToolDefinition {
        name: raw.name.clone(),
        description: raw.description.clone(),
        argv_template: vec![
            "sh".to_string(),
            "-c".to_string(),
            rewritten.into_owned(),
            "--".to_string(),
        ],
        parameters,
        stdin_param: None,
        syntax: ToolSyntax::Shell,
    })
}

// --- command (legacy) ---

fn expand_command(raw: &RawTool) -> Result<ToolDefinition> {
    let argv = raw.command.clone().unwrap_or_default();
    if argv.is_empty() {
        return Err(Error::InvalidTool {
            tool: raw.name.clone(),
            message: "command argv is empty".to_string(),
        });
    }
    if argv.iter().any(|a| placeholder_re().is_match(a)) {
        return Err(Error::InvalidTool {
            tool: raw.name.clone(),
            message: "command: argv does not take ${} placeholders; parameters are appended"
                .to_string(),
        });
    }

    // The explicit block is authoritative in legacy syntax: parameters are
    // appended to the argv in declaration order.
    let mut parameters = Vec::new();
    for (idx, rp) in raw.parameters.iter().enumerate() {
        let inject_as = rp.inject_as.unwrap_or(InjectAs::Argument);
        if rp.raw == Some(true) {
            return Err(Error::InvalidTool {
                tool: raw.name.clone(),
                message: format!("parameter {:?}: raw is only valid in shell: templates", rp.name),
            });
        }
        parameters.push(ToolParameter {
            name: rp.name.clone(),
            inject_as,
            option_name: rp.option_name.clone(),
            position: match inject_as {
                InjectAs::Stdin => None,
                _ => Some(rp.position.unwrap_or(idx)),
            },
            raw: false,
            required: rp.required.unwrap_or(rp.default.is_none()),
            default: rp.default.clone(),
            description: rp.description.clone(),
        });
    }

    Ok(ToolDefinition {
        name: raw.name.clone(),
        description: raw.description.clone(),
        argv_template: argv,
        parameters,
        stdin_param: None,
        syntax: ToolSyntax::Command,
    })
}

// --- shared passes ---

fn inferred_parameter(name: &str, position: usize, raw: bool) -> ToolParameter {
    ToolParameter {
        name: name.to_string(),
        inject_as: InjectAs::Argument,
        option_name: None,
        position: Some(position),
        raw,
        required: true,
        default: None,
        description: None,
    }
}

/// Merge the explicit `parameters:` block into the inferred manifest.
///
/// Only cosmetic fields may be overridden; the template is the single
/// source of truth for how a value is injected.
fn merge_explicit_block(raw: &RawTool, inferred: &mut [ToolParameter]) -> Result<()> {
    for rp in &raw.parameters {
        let Some(param) = inferred.iter_mut().find(|p| p.name == rp.name) else {
            // The stdin shorthand target may be declared here even though it
            // has no placeholder; it is appended in a later pass.
            if raw.stdin.as_deref() == Some(rp.name.as_str()) {
                continue;
            }
            return Err(Error::UndeclaredParameter {
                tool: raw.name.clone(),
                parameter: rp.name.clone(),
            });
        };

        let mode_conflict = matches!(rp.inject_as, Some(mode) if mode != param.inject_as)
            || matches!(rp.position, Some(pos) if Some(pos) != param.position)
            || matches!(rp.raw, Some(r) if r != param.raw);
        if mode_conflict {
            return Err(Error::ParameterModeConflict {
                tool: raw.name.clone(),
                parameter: rp.name.clone(),
            });
        }

        param.description = rp.description.clone().or(param.description.take());
        param.default = rp.default.clone();
        param.required = rp.required.unwrap_or(param.default.is_none());
    }
    Ok(())
}

/// Apply the `stdin: <param>` shorthand: append or upgrade.
fn apply_stdin_shorthand(raw: &RawTool, tool: &mut ToolDefinition) -> Result<()> {
    let Some(stdin_name) = raw.stdin.as_deref() else {
        return Ok(());
    };

    if let Some(param) = tool.parameters.iter_mut().find(|p| p.name == stdin_name) {
        // A placeholder-bound parameter already has an argv slot; it cannot
        // also be the stdin payload. Legacy command parameters have no
        // template binding, so those upgrade cleanly.
        if tool.syntax != ToolSyntax::Command && param.position.is_some() {
            return Err(Error::ParameterModeConflict {
                tool: raw.name.clone(),
                parameter: stdin_name.to_string(),
            });
        }
        param.inject_as = InjectAs::Stdin;
        param.position = None;
    } else {
        let declared = raw.parameters.iter().find(|rp| rp.name == stdin_name);
        tool.parameters.push(ToolParameter {
            name: stdin_name.to_string(),
            inject_as: InjectAs::Stdin,
            option_name: None,
            position: None,
            raw: false,
            required: declared
                .map(|rp| rp.required.unwrap_or(rp.default.is_none()))
                .unwrap_or(true),
            default: declared.and_then(|rp| rp.default.clone()),
            description: declared.and_then(|rp| rp.description.clone()),
        });
    }
    tool.stdin_param = Some(stdin_name.to_string());
    Ok(())
}

fn validate_structure(tool: &ToolDefinition) -> Result<()> {
    let stdin_count = tool
        .parameters
        .iter()
        .filter(|p| p.inject_as == InjectAs::Stdin)
        .count();
    if stdin_count > 1 {
        return Err(Error::InvalidTool {
            tool: tool.name.clone(),
            message: format!("{} parameters use inject_as: stdin; at most one is allowed", stdin_count),
        });
    }

    for param in &tool.parameters {
        if param.inject_as == InjectAs::Option && param.option_name.is_none() {
            return Err(Error::InvalidTool {
                tool: tool.name.clone(),
                message: format!(
                    "option parameter {:?} is missing option_name",
                    param.name
                ),
            });
        }
    }

    let mut names = HashSet::new();
    for param in &tool.parameters {
        if !names.insert(param.name.as_str()) {
            return Err(Error::InvalidTool {
                tool: tool.name.clone(),
                message: format!("duplicate parameter {:?}", param.name),
            });
        }
    }
    Ok(())
}
