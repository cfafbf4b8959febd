use fxhash::FxHashMap;

/// Electron mass [kg]
pub const ELECTRON_MASS: f64 = 9.1093837015e-31;

/// Resolves an ion species identifier to a mass in kilograms
pub trait IonMassLookup {
    fn ion_mass(&self, species: &str) -> Option<f64>;
}

/// Resolves a LAPD port number to an axial distance in cm
pub trait AxialLookup {
    fn port_to_z(&self, port: u32) -> f64;
}

/// Species table built from neutral atomic masses.
///
/// Species are written `<element>[-<mass number>]<charge>` where the charge is
/// either a run of `+` or a count followed by `+`, separated by a space:
/// `He-4+`, `Ar+`, `He-4 2+`, `p+`.
#[derive(Debug, Clone)]
pub struct IonTable {
    atomic_masses: FxHashMap<String, f64>,
}

impl Default for IonTable {
    fn default() -> Self {
        let mut atomic_masses = FxHashMap::default();
        for (isotope, mass) in [
            ("H-1", 1.6735328e-27),
            ("H-2", 3.3444946e-27),
            ("D", 3.3444946e-27),
            ("He-3", 5.0082343e-27),
            ("He-4", 6.6464764e-27),
            ("Ne-20", 3.3198772e-26),
            ("Ar-40", 6.6335209e-26),
            ("Kr-84", 1.3935162e-25),
            ("Xe-132", 2.1888653e-25),
        ] {
            atomic_masses.insert(isotope.to_string(), mass);
        }
        // Most abundant isotope when no mass number is given
        for (element, isotope) in [
            ("H", "H-1"),
            ("He", "He-4"),
            ("Ne", "Ne-20"),
            ("Ar", "Ar-40"),
            ("Kr", "Kr-84"),
            ("Xe", "Xe-132"),
        ] {
            let mass = atomic_masses[isotope];
            atomic_masses.insert(element.to_string(), mass);
        }
        Self { atomic_masses }
    }
}

impl IonTable {
    /// Split a species into its isotope and charge number
    fn parse(species: &str) -> Option<(&str, u32)> {
        let species = species.trim();
        if species == "p+" || species == "p" {
            return Some(("H-1", 1));
        }
        if let Some((isotope, charge)) = species.split_once(' ') {
            let count = charge.strip_suffix('+')?.parse::<u32>().ok()?;
            return Some((isotope, count));
        }
        let isotope = species.trim_end_matches('+');
        let charge = (species.len() - isotope.len()) as u32;
        if charge == 0 {
            return None;
        }
        Some((isotope, charge))
    }
}

impl IonMassLookup for IonTable {
    fn ion_mass(&self, species: &str) -> Option<f64> {
        let (isotope, charge) = Self::parse(species)?;
        let atomic = self.atomic_masses.get(isotope)?;
        Some(atomic - charge as f64 * ELECTRON_MASS)
    }
}

/// LAPD port geometry: port 53 sits at z = 0 and ports are 31.95 cm apart,
/// with z increasing toward the cathode (lower port numbers).
#[derive(Debug, Clone, Copy)]
pub struct LapdPorts {
    pub reference_port: u32,
    pub port_spacing_cm: f64,
}

impl Default for LapdPorts {
    fn default() -> Self {
        Self {
            reference_port: 53,
            port_spacing_cm: 31.95,
        }
    }
}

impl AxialLookup for LapdPorts {
    fn port_to_z(&self, port: u32) -> f64 {
        (self.reference_port as f64 - port as f64) * self.port_spacing_cm
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_helium_ion_mass() {
        let table = IonTable::default();
        let mass = table.ion_mass("He-4+").unwrap();
        assert_relative_eq!(mass, 6.6464764e-27 - ELECTRON_MASS, max_relative = 1e-9);
        assert_eq!(table.ion_mass("He+"), Some(mass));
        let doubly = table.ion_mass("He-4 2+").unwrap();
        assert_eq!(table.ion_mass("He-4++"), Some(doubly));
        assert!(doubly < mass);
    }

    #[test]
    fn test_unknown_species() {
        let table = IonTable::default();
        assert_eq!(table.ion_mass("Unobtainium+"), None);
        assert_eq!(table.ion_mass("He-4"), None);
        assert!(table.ion_mass("p+").is_some());
    }

    #[test]
    fn test_port_to_z() {
        let ports = LapdPorts::default();
        assert_eq!(ports.port_to_z(53), 0.0);
        assert_relative_eq!(ports.port_to_z(27), 26.0 * 31.95, epsilon = 1e-9);
    }
}
