//! Class-instantiation resolution.
//!
//! Given the callee text of a call that looks like a constructor
//! (`Handler()`, `models.Task()`), produce the class FQN with a
//! confidence reflecting how the name was resolved:
//!
//! - through the import map: 0.95 simple / 0.9 dotted
//! - declared in the current module: 0.8
//! - unconfirmed heuristic: 0.7 dotted / 0.6 simple

use callmap_core::{TypeInfo, TypeSource};

use crate::imports::ImportMap;
use crate::modules::ModuleRegistry;

// ============================================================================
// PascalCase Detection
// ============================================================================

/// True for names written like class names: first character uppercase,
/// not all-uppercase (constants are rejected), single uppercase letter
/// accepted.
pub fn is_pascal_case(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !first.is_uppercase() {
        return false;
    }
    if name.chars().count() == 1 {
        return true;
    }
    !name.chars().all(|c| !c.is_lowercase())
}

/// True when the last segment of a (possibly dotted) callee is PascalCase.
pub fn is_instantiation_target(callee: &str) -> bool {
    callee
        .rsplit('.')
        .next()
        .is_some_and(is_pascal_case)
}

// ============================================================================
// Resolution
// ============================================================================

/// Resolve a PascalCase callee to a class FQN.
///
/// Returns `None` when the callee's class segment is not PascalCase.
pub fn resolve_instantiation(
    callee: &str,
    module_path: &str,
    import_map: &ImportMap,
    registry: &ModuleRegistry,
) -> Option<TypeInfo> {
    if !is_instantiation_target(callee) {
        return None;
    }

    let dotted = callee.contains('.');
    if dotted {
        let (head, rest) = callee.split_once('.').unwrap_or((callee, ""));
        if let Some(head_fqn) = import_map.resolve(head) {
            return Some(TypeInfo::concrete(
                format!("{head_fqn}.{rest}"),
                0.9,
                TypeSource::ClassInstantiationImport,
            ));
        }
    } else if let Some(fqn) = import_map.resolve(callee) {
        return Some(TypeInfo::concrete(
            fqn,
            0.95,
            TypeSource::ClassInstantiationImport,
        ));
    }

    // Not imported: assume the class lives in the current module.
    let local_fqn = format!("{module_path}.{callee}");
    if declared_in_module(callee, module_path, registry) {
        return Some(TypeInfo::concrete(
            local_fqn,
            0.8,
            TypeSource::ClassInstantiationLocal,
        ));
    }

    let (confidence, source) = if dotted {
        (0.7, TypeSource::ClassInstantiationHeuristic)
    } else {
        (0.6, TypeSource::ClassInstantiationGuess)
    };
    Some(TypeInfo::concrete(local_fqn, confidence, source))
}

/// True when the registry's short-name index places the callee's class
/// segment in the current module's file.
fn declared_in_module(callee: &str, module_path: &str, registry: &ModuleRegistry) -> bool {
    let simple = callee.rsplit('.').next().unwrap_or(callee);
    let Some(file) = registry.get_file(module_path) else {
        return false;
    };
    registry
        .short_name_lookup(simple)
        .iter()
        .any(|f| f == file)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pascal_case_detection() {
        assert!(is_pascal_case("Handler"));
        assert!(is_pascal_case("HttpClient"));
        assert!(is_pascal_case("X"));
        assert!(!is_pascal_case("handler"));
        assert!(!is_pascal_case("CONSTANT"));
        assert!(!is_pascal_case("MAX_SIZE"));
        assert!(!is_pascal_case(""));
        assert!(!is_pascal_case("_Private"));
    }

    #[test]
    fn test_instantiation_target_uses_last_segment() {
        assert!(is_instantiation_target("Task"));
        assert!(is_instantiation_target("models.Task"));
        assert!(!is_instantiation_target("models.create"));
        assert!(!is_instantiation_target("models.CONST"));
    }

    #[test]
    fn test_simple_imported_name() {
        let mut imports = ImportMap::new();
        imports.insert("Task", "myapp.models.Task");
        let info =
            resolve_instantiation("Task", "myapp.views", &imports, &ModuleRegistry::new()).unwrap();
        assert_eq!(info.fqn(), Some("myapp.models.Task"));
        assert!((info.confidence - 0.95).abs() < 1e-6);
        assert_eq!(info.source, TypeSource::ClassInstantiationImport);
    }

    #[test]
    fn test_dotted_imported_module() {
        let mut imports = ImportMap::new();
        imports.insert("models", "myapp.models");
        let info =
            resolve_instantiation("models.Task", "myapp.views", &imports, &ModuleRegistry::new())
                .unwrap();
        assert_eq!(info.fqn(), Some("myapp.models.Task"));
        assert!((info.confidence - 0.9).abs() < 1e-6);
        assert_eq!(info.source, TypeSource::ClassInstantiationImport);
    }

    #[test]
    fn test_local_declaration_confirmed() {
        let mut registry = ModuleRegistry::new();
        registry.add_module("myapp.views", "myapp/views.py");
        registry.add_short_name("Widget", "myapp/views.py");

        let info =
            resolve_instantiation("Widget", "myapp.views", &ImportMap::new(), &registry).unwrap();
        assert_eq!(info.fqn(), Some("myapp.views.Widget"));
        assert!((info.confidence - 0.8).abs() < 1e-6);
        assert_eq!(info.source, TypeSource::ClassInstantiationLocal);
    }

    #[test]
    fn test_unconfirmed_falls_back_to_heuristic() {
        let registry = ModuleRegistry::new();
        let simple =
            resolve_instantiation("Widget", "myapp.views", &ImportMap::new(), &registry).unwrap();
        assert!((simple.confidence - 0.6).abs() < 1e-6);
        assert_eq!(simple.source, TypeSource::ClassInstantiationGuess);

        let dotted =
            resolve_instantiation("ui.Widget", "myapp.views", &ImportMap::new(), &registry)
                .unwrap();
        assert_eq!(dotted.fqn(), Some("myapp.views.ui.Widget"));
        assert!((dotted.confidence - 0.7).abs() < 1e-6);
        assert_eq!(dotted.source, TypeSource::ClassInstantiationHeuristic);
    }

    #[test]
    fn test_non_pascal_callee_is_not_instantiation() {
        assert!(resolve_instantiation(
            "helper",
            "myapp.views",
            &ImportMap::new(),
            &ModuleRegistry::new()
        )
        .is_none());
    }

    #[test]
    fn test_import_resolution_is_idempotent() {
        let mut imports = ImportMap::new();
        imports.insert("Task", "myapp.models.Task");
        let registry = ModuleRegistry::new();
        let first = resolve_instantiation("Task", "myapp.views", &imports, &registry).unwrap();
        let second = resolve_instantiation("Task", "myapp.views", &imports, &registry).unwrap();
        assert_eq!(first, second);
    }
}
