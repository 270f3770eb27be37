//! `grind status` command.

use std::path::Path;

use crate::context::ServiceContext;
use crate::workspace::find_dot_file;

/// Execute the `status` command.
///
/// Prints the assignment, the problem identified from `dir`, its current
/// step, and the files that will be submitted.
///
/// # Errors
///
/// Returns an error string if the workspace cannot be resolved or the
/// problem cannot be identified.
pub fn run(ctx: &ServiceContext, dir: &Path) -> Result<(), String> {
    let workspace = find_dot_file(ctx.fs.as_ref(), dir).map_err(|e| e.to_string())?;
    let target = workspace.identify_problem().map_err(|e| e.to_string())?;

    println!("Assignment: {}", workspace.dotfile.assignment_id);
    println!("Problem:    {} (id {})", target.unique, target.info.id);
    println!("Step:       {}", target.info.step);
    println!("Directory:  {}", target.dir.display());
    let allowed = target.info.allowed();
    if allowed.is_empty() {
        println!("Whitelist:  (none)");
    } else {
        println!("Whitelist:");
        for name in allowed {
            println!("  {name}");
        }
    }
    Ok(())
}
