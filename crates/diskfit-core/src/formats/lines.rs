use crate::domain::{DiskfitError, FormatResult};
use std::fmt::Write as _;

const LINE_INDEX_FORMAT: i64 = 2;

/// A gas species whose line emission the engine should compute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineSpecies {
    pub name: String,
    /// Molecular data style, e.g. `leiden`.
    pub input_style: String,
    pub collision_partners: Vec<String>,
}

impl LineSpecies {
    pub fn leiden(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            input_style: "leiden".to_string(),
            collision_partners: Vec::new(),
        }
    }
}

fn check_token(value: &str, what: &str, species: &str) -> FormatResult<()> {
    if value.is_empty() || value.chars().any(char::is_whitespace) {
        return Err(DiskfitError::format_mismatch(format!(
            "line species '{}' has an invalid {} '{}'",
            species, what, value
        )));
    }
    Ok(())
}

/// Renders `line.inp`.
pub fn render_line_index(species: &[LineSpecies]) -> FormatResult<String> {
    for entry in species {
        check_token(&entry.name, "name", &entry.name)?;
        check_token(&entry.input_style, "input style", &entry.name)?;
        for partner in &entry.collision_partners {
            check_token(partner, "collision partner", &entry.name)?;
        }
    }

    let mut out = String::new();
    let _ = writeln!(out, "{}", LINE_INDEX_FORMAT);
    let _ = writeln!(out, "{}", species.len());
    for entry in species {
        let _ = writeln!(
            out,
            "{} {} 0 0 {}",
            entry.name,
            entry.input_style,
            entry.collision_partners.len()
        );
        for partner in &entry.collision_partners {
            let _ = writeln!(out, "{}", partner);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::{LineSpecies, render_line_index};

    #[test]
    fn species_line_lists_style_and_partner_count() {
        let mut co = LineSpecies::leiden("co");
        co.collision_partners = vec!["p-h2".to_string(), "o-h2".to_string()];
        let rendered =
            render_line_index(&[co, LineSpecies::leiden("hco+")]).expect("index should render");

        assert_eq!(
            rendered,
            "2\n2\nco leiden 0 0 2\np-h2\no-h2\nhco+ leiden 0 0 0\n"
        );
    }

    #[test]
    fn whitespace_in_names_is_rejected() {
        let error = render_line_index(&[LineSpecies::leiden("c o")])
            .expect_err("name with whitespace should fail");
        assert_eq!(error.placeholder(), "FORMAT.MISMATCH");
    }
}
