/// The 36 states of the federation plus the Federal Capital Territory.
pub const NIGERIAN_STATES: [&str; 37] = [
    "Abia",
    "Adamawa",
    "Akwa Ibom",
    "Anambra",
    "Bauchi",
    "Bayelsa",
    "Benue",
    "Borno",
    "Cross River",
    "Delta",
    "Ebonyi",
    "Edo",
    "Ekiti",
    "Enugu",
    "FCT",
    "Gombe",
    "Imo",
    "Jigawa",
    "Kaduna",
    "Kano",
    "Katsina",
    "Kebbi",
    "Kogi",
    "Kwara",
    "Lagos",
    "Nasarawa",
    "Niger",
    "Ogun",
    "Ondo",
    "Osun",
    "Oyo",
    "Plateau",
    "Rivers",
    "Sokoto",
    "Taraba",
    "Yobe",
    "Zamfara",
];

/// Canonical spelling of a state name, accepting "Abuja" for the FCT.
pub fn canonical_state(value: &str) -> Option<&'static str> {
    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case("abuja") || trimmed.eq_ignore_ascii_case("federal capital territory")
    {
        return Some("FCT");
    }

    NIGERIAN_STATES
        .iter()
        .copied()
        .find(|state| state.eq_ignore_ascii_case(trimmed))
}

/// True when `state` names the same state as any entry of `states`.
pub(crate) fn state_listed(state: &str, states: &[String]) -> bool {
    let Some(canonical) = canonical_state(state) else {
        return false;
    };
    states
        .iter()
        .filter_map(|candidate| canonical_state(candidate))
        .any(|candidate| candidate == canonical)
}
