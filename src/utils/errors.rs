//! User-Friendly Error Formatting
//!
//! Turns fatal startup errors into a message with troubleshooting hints.

use std::fmt::Write;

/// Format error for user consumption
///
/// Takes technical error and produces user-friendly message with
/// troubleshooting steps and context.
pub fn format_user_error(error: &anyhow::Error) -> String {
    let mut output = String::new();

    writeln!(&mut output).ok();
    writeln!(
        &mut output,
        "╔════════════════════════════════════════════════════════════╗"
    )
    .ok();
    writeln!(
        &mut output,
        "║                     ERROR                                  ║"
    )
    .ok();
    writeln!(
        &mut output,
        "╚════════════════════════════════════════════════════════════╝"
    )
    .ok();
    writeln!(&mut output).ok();

    // Match on the whole chain, context layers included
    let error_msg = format!("{:#}", error);

    if error_msg.contains("control socket") {
        format_socket_error(&mut output);
    } else if error_msg.contains("config") {
        format_config_error(&mut output);
    } else if error_msg.contains("UI worker") {
        format_worker_error(&mut output);
    } else {
        format_generic_error(&mut output, &error.to_string());
    }

    writeln!(&mut output).ok();
    writeln!(
        &mut output,
        "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━"
    )
    .ok();
    writeln!(&mut output, "Technical Details:").ok();
    writeln!(&mut output).ok();
    writeln!(&mut output, "{:#}", error).ok();
    writeln!(&mut output).ok();

    writeln!(
        &mut output,
        "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━"
    )
    .ok();
    writeln!(&mut output, "Need Help?").ok();
    writeln!(
        &mut output,
        "  - Run with --verbose for detailed logs: builtin-broker -vvv"
    )
    .ok();
    writeln!(
        &mut output,
        "  - Or set RUST_LOG=builtin_broker=trace for full tracing"
    )
    .ok();

    output
}

fn format_socket_error(output: &mut String) {
    writeln!(output, "Control Socket Error").ok();
    writeln!(output).ok();
    writeln!(output, "Could not open the broker's control socket.").ok();
    writeln!(output).ok();
    writeln!(output, "Common Causes:").ok();
    writeln!(output).ok();
    writeln!(output, "  1. Another broker instance is running").ok();
    writeln!(output, "     → Check: pgrep -a builtin-broker").ok();
    writeln!(output, "     → Stop it, or pick another path with --socket").ok();
    writeln!(output).ok();
    writeln!(output, "  2. Socket directory is not writable").ok();
    writeln!(output, "     → Check permissions on the parent directory").ok();
    writeln!(
        output,
        "     → Default location is $XDG_RUNTIME_DIR/builtin-broker.sock"
    )
    .ok();
    writeln!(output).ok();
    writeln!(output, "  3. Path is too long for a Unix socket").ok();
    writeln!(output, "     → Socket paths are limited to ~108 bytes").ok();
    writeln!(output).ok();
    writeln!(output, "  4. Something other than a socket sits at the path").ok();
    writeln!(output, "     → The broker never deletes regular files; move it or fix --socket").ok();
}

fn format_config_error(output: &mut String) {
    writeln!(output, "Configuration Error").ok();
    writeln!(output).ok();
    writeln!(output, "Problem with configuration file.").ok();
    writeln!(output).ok();
    writeln!(output, "Common Causes:").ok();
    writeln!(output).ok();
    writeln!(output, "  1. Invalid TOML syntax").ok();
    writeln!(output, "     → Check for typos, missing quotes, etc.").ok();
    writeln!(output).ok();
    writeln!(output, "  2. Value out of range").ok();
    writeln!(
        output,
        "     → window.offset_x must be between ±600 and ±800"
    )
    .ok();
    writeln!(output, "     → display size and density are fixed, remove them from [display]").ok();
    writeln!(output).ok();
    writeln!(output, "  3. Unknown log level or format").ok();
    writeln!(output, "     → level: error, warn, info, debug, trace").ok();
    writeln!(output, "     → format: pretty, compact, json").ok();
}

fn format_worker_error(output: &mut String) {
    writeln!(output, "UI Worker Error").ok();
    writeln!(output).ok();
    writeln!(output, "The serializing UI worker thread could not run.").ok();
    writeln!(output).ok();
    writeln!(output, "Troubleshooting:").ok();
    writeln!(output).ok();
    writeln!(output, "  1. Check the process thread limit: ulimit -u").ok();
    writeln!(output, "  2. Check available memory: free -h").ok();
}

fn format_generic_error(output: &mut String, error: &str) {
    writeln!(output, "Broker Error").ok();
    writeln!(output).ok();
    writeln!(output, "An error occurred while running the broker.").ok();
    writeln!(output).ok();
    writeln!(output, "Error: {}", error).ok();
}
