use std::path::PathBuf;

use gleaner_core::{discover_documents, LocalStore};

pub struct ValidateArgs {
    pub config: Option<PathBuf>,
    pub template_info: PathBuf,
    pub input: Option<String>,
}

/// Pre-flight validation: every check runs and reports before the command
/// fails, so one pass surfaces all problems.
pub async fn run(args: ValidateArgs) -> anyhow::Result<()> {
    let mut failures = 0usize;

    match super::load_config(args.config.as_ref()).and_then(|c| {
        c.validate_for_run()?;
        Ok(c)
    }) {
        Ok(_) => println!("ok: configuration"),
        Err(e) => {
            println!("error: configuration: {e}");
            failures += 1;
        }
    }

    match gleaner_core::load_template_ref(&args.template_info) {
        Ok(template) => println!("ok: template ({template})"),
        Err(e) => {
            println!("error: template: {e}");
            failures += 1;
        }
    }

    if let Some(input) = &args.input {
        let store = LocalStore::new();
        match discover_documents(&store, input, false).await {
            Ok(documents) => println!("ok: input ({} documents)", documents.len()),
            Err(e) => {
                println!("error: input: {e}");
                failures += 1;
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{failures} validation check(s) failed");
    }
    println!("All checks passed");
    Ok(())
}
