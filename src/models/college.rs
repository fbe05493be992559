/// Colleges offered at registration. Matching compares the stored string, so
/// this list is the canonical spelling.
pub const COLLEGES: &[&str] = &[
    "Harvard University",
    "MIT",
    "Stanford University",
    "Yale University",
    "Princeton University",
    "Columbia University",
    "University of Pennsylvania",
    "Cornell University",
    "Dartmouth College",
    "Brown University",
    "University of California, Berkeley",
    "University of California, Los Angeles",
    "University of Michigan",
    "University of Virginia",
    "University of North Carolina",
    "Duke University",
    "New York University",
    "Boston University",
    "Northeastern University",
    "Other",
];

pub fn is_known_college(name: &str) -> bool {
    COLLEGES.contains(&name)
}
