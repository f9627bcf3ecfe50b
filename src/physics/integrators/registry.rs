//! Registry pattern for dynamic integrator management
//!
//! Each integrator is self-describing, providing its own name, aliases, and
//! convergence order. The registry queries this metadata on registration to
//! build the lookup table used for name resolution and instantiation.

use super::{DormandPrince45, Fehlberg78, Integrator, StiffnessSwitching};
use crate::error::{SynodicError, SynodicResult};
use std::collections::{BTreeSet, HashMap};

/// Registry for runtime integrator lookup by name
///
/// Built-in integrators are stateless zero-sized types, so `create` only
/// allocates a new box.
pub struct IntegratorRegistry<const N: usize> {
    /// Maps names (canonical and aliases) to integrator instances
    integrators: HashMap<String, Box<dyn Integrator<N>>>,
}

impl<const N: usize> IntegratorRegistry<N> {
    /// Create an empty registry without any pre-registered integrators.
    pub fn new() -> Self {
        Self {
            integrators: HashMap::new(),
        }
    }

    /// Register the built-in methods. Returns self for method chaining.
    pub fn with_standard_integrators(mut self) -> Self {
        self.register_integrator(Box::new(DormandPrince45));
        self.register_integrator(Box::new(Fehlberg78));
        self.register_integrator(Box::new(StiffnessSwitching));
        self
    }

    /// Register a single integrator. Returns self for method chaining.
    pub fn with_integrator(mut self, integrator: Box<dyn Integrator<N>>) -> Self {
        self.register_integrator(integrator);
        self
    }

    pub fn register_integrator(&mut self, integrator: Box<dyn Integrator<N>>) {
        for alias in integrator.aliases() {
            self.integrators
                .insert(alias.to_string(), integrator.clone_box());
        }
        self.integrators
            .insert(integrator.name().to_string(), integrator);
    }

    /// # Errors
    /// [`SynodicError::UnknownMethod`] listing the canonical names when
    /// `name` matches neither a name nor an alias.
    pub fn create(&self, name: &str) -> SynodicResult<Box<dyn Integrator<N>>> {
        self.integrators
            .get(name)
            .map(|integrator| integrator.clone_box())
            .ok_or_else(|| SynodicError::UnknownMethod {
                name: name.to_string(),
                available: self.list_available().join(", "),
            })
    }

    /// Canonical names, sorted
    pub fn list_available(&self) -> Vec<String> {
        self.integrators
            .values()
            .map(|integrator| integrator.name().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// (alias, canonical name) pairs, sorted by alias
    pub fn list_aliases(&self) -> Vec<(String, String)> {
        let mut aliases: Vec<(String, String)> = self
            .integrators
            .iter()
            .filter(|(key, integrator)| key.as_str() != integrator.name())
            .map(|(key, integrator)| (key.clone(), integrator.name().to_string()))
            .collect();
        aliases.sort();
        aliases
    }
}

impl<const N: usize> Default for IntegratorRegistry<N> {
    fn default() -> Self {
        Self::new().with_standard_integrators()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::integrators::{
        OdeSystem, Output, SolveError, Solution, SolverOptions, TimeSpan,
    };
    use crate::physics::math::Scalar;

    // Returns its initial state at the requested times
    #[derive(Debug, Clone)]
    struct Frozen;

    impl Integrator<1> for Frozen {
        fn clone_box(&self) -> Box<dyn Integrator<1>> {
            Box::new(self.clone())
        }

        fn name(&self) -> &'static str {
            "frozen"
        }

        fn aliases(&self) -> Vec<&'static str> {
            vec!["fz", "still"]
        }

        fn convergence_order(&self) -> usize {
            0
        }

        fn solve(
            &self,
            _system: &dyn OdeSystem<1>,
            span: TimeSpan,
            y0: &[Scalar; 1],
            _output: Output<'_>,
            _options: &SolverOptions,
        ) -> Result<Solution<1>, SolveError<1>> {
            let mut solution = Solution::with_capacity(2);
            solution.push(span.start, *y0);
            solution.push(span.end, *y0);
            Ok(solution)
        }
    }

    #[derive(Debug, Clone)]
    struct NoAlias;

    impl Integrator<1> for NoAlias {
        fn clone_box(&self) -> Box<dyn Integrator<1>> {
            Box::new(self.clone())
        }

        fn name(&self) -> &'static str {
            "no_alias"
        }

        fn convergence_order(&self) -> usize {
            1
        }

        fn solve(
            &self,
            _system: &dyn OdeSystem<1>,
            _span: TimeSpan,
            _y0: &[Scalar; 1],
            _output: Output<'_>,
            _options: &SolverOptions,
        ) -> Result<Solution<1>, SolveError<1>> {
            Ok(Solution::with_capacity(0))
        }
    }

    fn create_test_registry() -> IntegratorRegistry<1> {
        IntegratorRegistry::<1>::new()
            .with_integrator(Box::new(Frozen))
            .with_integrator(Box::new(NoAlias))
    }

    #[test]
    fn test_registry_discovery() {
        let registry = create_test_registry();
        assert_eq!(registry.list_available(), vec!["frozen", "no_alias"]);
    }

    #[test]
    fn test_alias_resolution() {
        let registry = create_test_registry();
        for name in ["frozen", "fz", "still"] {
            let integrator = registry.create(name).unwrap();
            assert_eq!(integrator.name(), "frozen");
            assert_eq!(integrator.convergence_order(), 0);
        }
    }

    #[test]
    fn test_list_aliases() {
        let registry = create_test_registry();
        assert_eq!(
            registry.list_aliases(),
            vec![
                ("fz".to_string(), "frozen".to_string()),
                ("still".to_string(), "frozen".to_string()),
            ]
        );
    }

    #[test]
    fn test_unknown_integrator_error() {
        let registry = create_test_registry();
        let Err(error) = registry.create("nonexistent") else {
            panic!("lookup of an unregistered name succeeded");
        };
        assert!(matches!(error, SynodicError::UnknownMethod { .. }));
        let message = error.to_string();
        assert!(message.contains("'nonexistent'"));
        assert!(message.contains("frozen, no_alias"));
    }

    #[test]
    fn test_case_sensitivity() {
        let registry = create_test_registry();
        assert!(registry.create("FROZEN").is_err());
        assert!(registry.create("Fz").is_err());
        assert!(registry.create("fz").is_ok());
    }

    #[test]
    fn test_duplicate_registration() {
        let registry = IntegratorRegistry::<1>::new()
            .with_integrator(Box::new(Frozen))
            .with_integrator(Box::new(Frozen));
        assert_eq!(registry.list_available().len(), 1);
        assert_eq!(registry.list_aliases().len(), 2);
    }

    #[test]
    fn test_created_integrator_solves() {
        let registry = create_test_registry();
        let integrator = registry.create("still").unwrap();
        let system = |_t: Scalar, y: &[Scalar; 1]| [y[0]];
        let solution = integrator
            .solve(
                &system,
                TimeSpan::new(0.0, 2.0),
                &[3.0],
                Output::Steps,
                &SolverOptions::default(),
            )
            .unwrap();
        assert_eq!(solution.t, vec![0.0, 2.0]);
        assert_eq!(solution.y, vec![[3.0], [3.0]]);
    }

    #[test]
    fn test_empty_registry() {
        let registry = IntegratorRegistry::<1>::new();
        assert!(registry.list_available().is_empty());
        assert!(registry.list_aliases().is_empty());
        assert!(registry.create("rk45").is_err());
    }

    #[test]
    fn test_standard_registry() {
        let registry = IntegratorRegistry::<4>::default();
        assert_eq!(registry.list_available(), vec!["auto", "rk45", "rkf78"]);

        for (alias, canonical) in registry.list_aliases() {
            let via_alias = registry.create(&alias).unwrap();
            let via_canonical = registry.create(&canonical).unwrap();
            assert_eq!(via_alias.name(), via_canonical.name());
            assert_eq!(
                via_alias.convergence_order(),
                via_canonical.convergence_order()
            );
        }

        assert_eq!(registry.create("DOP853").unwrap().name(), "rkf78");
        assert_eq!(registry.create("rk45").unwrap().convergence_order(), 5);
        assert_eq!(registry.create("rkf78").unwrap().convergence_order(), 8);
    }
}
