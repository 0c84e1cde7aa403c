//! Bundled region table and location resolution.

use agrigate_core::ToolError;

/// A named agricultural region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    pub name: &'static str,
    pub lat: f64,
    pub lon: f64,
}

/// Named regions the gateway resolves without a geocoding service:
/// Indian states and major agricultural districts.
pub const REGIONS: &[Region] = &[
    Region { name: "Punjab", lat: 30.9, lon: 75.85 },
    Region { name: "Haryana", lat: 29.06, lon: 76.09 },
    Region { name: "Uttar Pradesh", lat: 26.85, lon: 80.91 },
    Region { name: "Bihar", lat: 25.1, lon: 85.31 },
    Region { name: "West Bengal", lat: 22.99, lon: 87.85 },
    Region { name: "Assam", lat: 26.2, lon: 92.94 },
    Region { name: "Odisha", lat: 20.95, lon: 85.1 },
    Region { name: "Jharkhand", lat: 23.61, lon: 85.28 },
    Region { name: "Chhattisgarh", lat: 21.28, lon: 81.87 },
    Region { name: "Madhya Pradesh", lat: 22.97, lon: 78.66 },
    Region { name: "Rajasthan", lat: 27.02, lon: 74.22 },
    Region { name: "Gujarat", lat: 22.26, lon: 71.19 },
    Region { name: "Maharashtra", lat: 19.75, lon: 75.71 },
    Region { name: "Karnataka", lat: 15.32, lon: 75.71 },
    Region { name: "Kerala", lat: 10.85, lon: 76.27 },
    Region { name: "Tamil Nadu", lat: 11.13, lon: 78.66 },
    Region { name: "Andhra Pradesh", lat: 15.91, lon: 79.74 },
    Region { name: "Telangana", lat: 18.11, lon: 79.02 },
    Region { name: "Goa", lat: 15.3, lon: 74.12 },
    Region { name: "Himachal Pradesh", lat: 31.1, lon: 77.17 },
    Region { name: "Uttarakhand", lat: 30.07, lon: 79.02 },
    Region { name: "Jammu", lat: 32.73, lon: 74.87 },
    Region { name: "Kashmir Valley", lat: 34.08, lon: 74.8 },
    Region { name: "Ladakh", lat: 34.15, lon: 77.58 },
    Region { name: "Sikkim", lat: 27.53, lon: 88.51 },
    Region { name: "Meghalaya", lat: 25.47, lon: 91.37 },
    Region { name: "Manipur", lat: 24.66, lon: 93.91 },
    Region { name: "Mizoram", lat: 23.16, lon: 92.94 },
    Region { name: "Nagaland", lat: 26.16, lon: 94.56 },
    Region { name: "Tripura", lat: 23.94, lon: 91.99 },
    Region { name: "Arunachal Pradesh", lat: 28.22, lon: 94.73 },
    Region { name: "Delhi", lat: 28.7, lon: 77.1 },
    Region { name: "Chandigarh", lat: 30.73, lon: 76.78 },
    Region { name: "Puducherry", lat: 11.94, lon: 79.81 },
    Region { name: "Ludhiana", lat: 30.9, lon: 75.86 },
    Region { name: "Amritsar", lat: 31.63, lon: 74.87 },
    Region { name: "Karnal", lat: 29.69, lon: 76.99 },
    Region { name: "Hisar", lat: 29.15, lon: 75.72 },
    Region { name: "Lucknow", lat: 26.85, lon: 80.95 },
    Region { name: "Kanpur", lat: 26.45, lon: 80.33 },
    Region { name: "Varanasi", lat: 25.32, lon: 82.99 },
    Region { name: "Patna", lat: 25.59, lon: 85.14 },
    Region { name: "Kolkata", lat: 22.57, lon: 88.36 },
    Region { name: "Guwahati", lat: 26.14, lon: 91.74 },
    Region { name: "Nagpur", lat: 21.15, lon: 79.09 },
    Region { name: "Pune", lat: 18.52, lon: 73.86 },
    Region { name: "Nashik", lat: 19.99, lon: 73.79 },
    Region { name: "Indore", lat: 22.72, lon: 75.86 },
    Region { name: "Bhopal", lat: 23.26, lon: 77.41 },
    Region { name: "Raipur", lat: 21.25, lon: 81.63 },
    Region { name: "Jaipur", lat: 26.91, lon: 75.79 },
    Region { name: "Jodhpur", lat: 26.24, lon: 73.02 },
    Region { name: "Ahmedabad", lat: 23.02, lon: 72.57 },
    Region { name: "Surat", lat: 21.17, lon: 72.83 },
    Region { name: "Hyderabad", lat: 17.39, lon: 78.49 },
    Region { name: "Vijayawada", lat: 16.51, lon: 80.65 },
    Region { name: "Bangalore", lat: 12.97, lon: 77.59 },
    Region { name: "Mysore", lat: 12.3, lon: 76.64 },
    Region { name: "Chennai", lat: 13.08, lon: 80.27 },
    Region { name: "Coimbatore", lat: 11.02, lon: 76.96 },
    Region { name: "Thrissur", lat: 10.53, lon: 76.21 },
];

/// Resolve free-form text to a region: case-insensitive exact match
/// first, then whole-word containment in either direction ("Punjab
/// state" resolves to Punjab, "uttar" resolves to Uttar Pradesh).
///
/// Containment is checked on word tokens, never raw substrings, so a
/// short name like "Goa" cannot swallow unrelated words ("goal").
pub fn resolve_location(query: &str) -> Result<&'static Region, ToolError> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Err(ToolError::InvalidInput("location must not be empty".into()));
    }

    if let Some(region) = REGIONS
        .iter()
        .find(|r| r.name.to_lowercase() == needle)
    {
        return Ok(region);
    }

    let needle_tokens = word_tokens(&needle);
    REGIONS
        .iter()
        .find(|r| {
            let name = r.name.to_lowercase();
            let name_tokens = word_tokens(&name);
            contains_token_run(&needle_tokens, &name_tokens)
                || contains_token_run(&name_tokens, &needle_tokens)
        })
        .ok_or_else(|| {
            ToolError::InvalidInput(format!("unknown location: {}", query.trim()))
        })
}

/// First region whose name appears, as a whole-word run, inside the
/// given text. Used to spot locations inside free-form queries.
pub fn find_region_mention(text: &str) -> Option<&'static Region> {
    let lowered = text.to_lowercase();
    let text_tokens = word_tokens(&lowered);
    REGIONS.iter().find(|r| {
        let name = r.name.to_lowercase();
        let name_tokens = word_tokens(&name);
        contains_token_run(&text_tokens, &name_tokens)
    })
}

fn word_tokens(lowered: &str) -> Vec<&str> {
    lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Whether `run` appears as a contiguous sequence of whole tokens in
/// `haystack`.
fn contains_token_run(haystack: &[&str], run: &[&str]) -> bool {
    !run.is_empty()
        && (haystack.windows(run.len()).any(|window| window == run))
}

/// The three nearest region names by edit distance, for "did you mean"
/// responses on unknown locations.
pub fn suggest_locations(query: &str) -> Vec<String> {
    let needle = query.trim().to_lowercase();
    let mut ranked: Vec<(usize, &str)> = REGIONS
        .iter()
        .map(|r| (strsim::levenshtein(&needle, &r.name.to_lowercase()), r.name))
        .collect();
    ranked.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(b.1)));
    ranked.into_iter().take(3).map(|(_, name)| name.to_string()).collect()
}
