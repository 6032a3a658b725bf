use log::error;

/// Logs the whole context chain of `error` and hands it back to the caller.
pub fn handle_error(error: anyhow::Error) -> anyhow::Error {
    let chain = error
        .chain()
        .enumerate()
        .map(|(depth, cause)| format!("{depth}: {cause}"))
        .collect::<Vec<_>>()
        .join("\n");
    error!("{}\n{}", error, chain);
    error
}

/// Renders an error chain on one line, outermost context first.
pub fn chain_message(error: &anyhow::Error) -> String {
    format!("{error:#}")
}
