use anyhow::Result;
use std::path::Path;

use vademecum::input::load_organizations;

/// Print the parsed organization list with the indices used by resume
pub fn organizations(input: &Path) -> Result<()> {
    let organizations = load_organizations(input)?;

    println!("Organizations in {}", input.display());
    println!("==================");
    for (index, organization) in organizations.iter().enumerate() {
        println!("{index:>5}  {organization}");
    }
    println!("\nTotal: {}", organizations.len());

    Ok(())
}
