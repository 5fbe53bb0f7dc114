//! Internal module registrar generation
//!
//! Emits the C++ source listing the registration functions of modules linked into
//! the engine. Priority modules load before the regular ones. Standalone output
//! adds exported entry points so the tables can be looked up from a shared library.

use anyhow::{bail, Context, Result};
use std::fmt::Write as FmtWrite;
use std::path::Path;

/// Registration function symbols, in load order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleList {
    pub priority: Vec<String>,
    pub regular: Vec<String>,
    pub standalone: bool,
}

fn is_symbol(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn write_table(output: &mut String, name: &str, symbols: &[String]) -> Result<()> {
    writeln!(
        output,
        "static const deModuleSystem::FPRegisterInternalModule {}[] = {{",
        name
    )?;
    for symbol in symbols {
        writeln!(output, "\t{},", symbol)?;
    }
    writeln!(output, "\tnullptr")?;
    writeln!(output, "}};")?;
    writeln!(output)?;
    Ok(())
}

/// Generate the registrar source.
pub fn generate_registrar(modules: &ModuleList) -> Result<String> {
    let symbols = modules.priority.iter().chain(&modules.regular);
    for symbol in symbols.clone() {
        if !is_symbol(symbol) {
            bail!("Invalid registration function name: '{}'", symbol);
        }
    }

    let mut output = String::new();

    writeln!(output, "// GENERATED FILE - DO NOT EDIT")?;
    writeln!(output, "// Generated by de-build modules")?;
    writeln!(output)?;

    if modules.standalone {
        writeln!(output, "#include <dragengine/systems/deModuleSystem.h>")?;
        writeln!(output, "#include <dragengine/systems/modules/deInternalModule.h>")?;
        writeln!(output)?;
    }

    for symbol in symbols {
        writeln!(
            output,
            "deTObjectReference<deInternalModule> {}(deModuleSystem *system);",
            symbol
        )?;
    }
    writeln!(output)?;

    write_table(&mut output, "vInternalModuleFunctionsPriority", &modules.priority)?;
    write_table(&mut output, "vInternalModuleFunctions", &modules.regular)?;

    if modules.standalone {
        writeln!(output, "#ifdef OS_W32")?;
        writeln!(output, "#define DE_INTERNAL_MODULES_EXPORT __declspec(dllexport)")?;
        writeln!(output, "#else")?;
        writeln!(
            output,
            "#define DE_INTERNAL_MODULES_EXPORT __attribute__((visibility(\"default\")))"
        )?;
        writeln!(output, "#endif")?;
        writeln!(output)?;
        writeln!(output, "extern \"C\" {{")?;
        for (entry, table) in [
            ("DEInternalModuleFunctionsPriority", "vInternalModuleFunctionsPriority"),
            ("DEInternalModuleFunctions", "vInternalModuleFunctions"),
        ] {
            writeln!(
                output,
                "DE_INTERNAL_MODULES_EXPORT const deModuleSystem::FPRegisterInternalModule *{}(){{",
                entry
            )?;
            writeln!(output, "\treturn {};", table)?;
            writeln!(output, "}}")?;
        }
        writeln!(output, "}}")?;
    }

    Ok(output)
}

pub fn write_registrar(modules: &ModuleList, path: &Path) -> Result<()> {
    let source = generate_registrar(modules)?;
    std::fs::write(path, source)
        .with_context(|| format!("Failed to write registrar: {}", path.display()))?;
    tracing::info!(
        "Wrote {} ({} priority, {} regular)",
        path.display(),
        modules.priority.len(),
        modules.regular.len()
    );
    Ok(())
}

/// Compare the file on disk with freshly generated output.
pub fn check_registrar(modules: &ModuleList, path: &Path) -> Result<bool> {
    let expected = generate_registrar(modules)?;
    let existing = match std::fs::read_to_string(path) {
        Ok(existing) => existing,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read registrar: {}", path.display()))
        }
    };
    Ok(existing == expected)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn modules(standalone: bool) -> ModuleList {
        ModuleList {
            priority: vec!["deoxrRegisterInternalModule".into()],
            regular: vec![
                "deoglRegisterInternalModule".into(),
                "dealRegisterInternalModule".into(),
            ],
            standalone,
        }
    }

    #[test]
    fn test_tables_keep_order() {
        let source = generate_registrar(&modules(false)).unwrap();
        assert!(source.starts_with("// GENERATED FILE - DO NOT EDIT\n"));
        assert!(source.contains(
            "vInternalModuleFunctions[] = {\n\tdeoglRegisterInternalModule,\n\tdealRegisterInternalModule,\n\tnullptr\n};"
        ));
        assert!(source.contains(
            "vInternalModuleFunctionsPriority[] = {\n\tdeoxrRegisterInternalModule,\n\tnullptr\n};"
        ));
        assert!(source.contains(
            "deTObjectReference<deInternalModule> dealRegisterInternalModule(deModuleSystem *system);"
        ));
        assert!(!source.contains("extern \"C\""));
        assert!(!source.contains("#include"));
    }

    #[test]
    fn test_standalone_entry_points() {
        let source = generate_registrar(&modules(true)).unwrap();
        assert!(source.contains("#include <dragengine/systems/deModuleSystem.h>"));
        assert!(source.contains("*DEInternalModuleFunctionsPriority(){\n\treturn vInternalModuleFunctionsPriority;"));
        assert!(source.contains("*DEInternalModuleFunctions(){\n\treturn vInternalModuleFunctions;"));
    }

    #[test]
    fn test_empty_tables() {
        let source = generate_registrar(&ModuleList::default()).unwrap();
        assert!(source.contains("vInternalModuleFunctions[] = {\n\tnullptr\n};"));
    }

    #[test]
    fn test_invalid_symbol() {
        let list = ModuleList {
            regular: vec!["not a symbol".into()],
            ..Default::default()
        };
        assert!(generate_registrar(&list).is_err());
    }

    #[test]
    fn test_check() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registrar.cpp");
        assert!(!check_registrar(&modules(false), &path).unwrap());

        write_registrar(&modules(false), &path).unwrap();
        assert!(check_registrar(&modules(false), &path).unwrap());
        assert!(!check_registrar(&modules(true), &path).unwrap());
    }
}
