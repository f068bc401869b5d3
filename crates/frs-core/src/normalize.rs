//! Field normalization shared by the dimension builders.
//!
//! Every function here is idempotent: applying it to its own output returns
//! the output unchanged. The Type 1 correction flows depend on this, since
//! they compare freshly normalized source values against values that were
//! normalized by an earlier run.

/// Canonical spellings of academic titles, matched against a token's letters
/// and digits in lower case. Applied token by token, in this order. The
/// engineering degrees and the doctorate are written without dots.
pub const ACADEMIC_TITLES: &[(&str, &str)] = &[
  ("prof", "Prof."),
  ("dr", "Dr."),
  ("ir", "Ir."),
  ("phd", "PhD"),
  ("skom", "S.Kom"),
  ("mkom", "M.Kom"),
  ("spt", "S.Pt"),
  ("st", "ST"),
  ("mt", "MT"),
  ("msc", "M.Sc"),
  ("ssi", "S.Si"),
  ("msi", "M.Si"),
];

/// Trim and collapse internal runs of whitespace to a single space.
pub fn collapse_whitespace(raw: &str) -> String {
  raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Upper-case the first letter of every alphabetic run and lower-case the
/// rest, so `"o'NEIL-smith"` becomes `"O'Neil-Smith"`.
pub fn title_case(raw: &str) -> String {
  let mut out = String::with_capacity(raw.len());
  let mut in_word = false;
  for c in raw.chars() {
    if c.is_alphabetic() {
      if in_word {
        out.extend(c.to_lowercase());
      } else {
        out.extend(c.to_uppercase());
      }
      in_word = true;
    } else {
      out.push(c);
      in_word = false;
    }
  }
  out
}

/// Upper-case the first character and lower-case the rest.
pub fn capitalize(raw: &str) -> String {
  let mut chars = raw.chars();
  match chars.next() {
    Some(first) => first
      .to_uppercase()
      .chain(chars.flat_map(char::to_lowercase))
      .collect(),
    None => String::new(),
  }
}

/// Trimmed, whitespace-collapsed, title-cased text; `None` when blank.
pub fn title_text(raw: Option<&str>) -> Option<String> {
  let collapsed = collapse_whitespace(raw?);
  (!collapsed.is_empty()).then(|| title_case(&collapsed))
}

/// A person's name with academic titles spelled canonically.
pub fn academic_name(raw: Option<&str>) -> Option<String> {
  let titled = title_text(raw)?;
  let tokens: Vec<String> = titled
    .split(' ')
    .map(|token| {
      token
        .split(',')
        .map(canonical_title)
        .collect::<Vec<_>>()
        .join(",")
    })
    .collect();
  Some(tokens.join(" "))
}

fn canonical_title(piece: &str) -> String {
  let key: String = piece
    .chars()
    .filter(char::is_ascii_alphanumeric)
    .map(|c| c.to_ascii_lowercase())
    .collect();
  ACADEMIC_TITLES
    .iter()
    .find(|(abbrev, _)| *abbrev == key)
    .map_or_else(|| piece.to_string(), |(_, canonical)| canonical.to_string())
}

/// Trimmed, lower-cased email; `None` when blank.
pub fn email(raw: Option<&str>) -> Option<String> {
  let trimmed = raw?.trim();
  (!trimmed.is_empty()).then(|| trimmed.to_lowercase())
}

/// The minimal validity check applied to dimension emails.
pub fn is_valid_email(email: &str) -> bool { email.contains('@') }

/// Trimmed, upper-cased section name; `None` when blank.
pub fn section(raw: Option<&str>) -> Option<String> {
  let trimmed = raw?.trim();
  (!trimmed.is_empty()).then(|| trimmed.to_uppercase())
}

/// Trimmed text with no case change; `None` when blank.
pub fn trimmed(raw: Option<&str>) -> Option<String> {
  let trimmed = raw?.trim();
  (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn title_case_restarts_after_non_letters() {
    assert_eq!(title_case("budi SANTOSO"), "Budi Santoso");
    assert_eq!(title_case("o'neil-SMITH"), "O'Neil-Smith");
    assert_eq!(title_case("s.kom"), "S.Kom");
    assert_eq!(title_case("teknik informatika 2"), "Teknik Informatika 2");
  }

  #[test]
  fn capitalize_only_touches_the_first_letter() {
    assert_eq!(capitalize("ADD"), "Add");
    assert_eq!(capitalize("drop"), "Drop");
    assert_eq!(capitalize(""), "");
  }

  #[test]
  fn academic_titles_are_canonicalized() {
    assert_eq!(
      academic_name(Some("  dr  ahmad   saikhu, s.kom, mt ")).as_deref(),
      Some("Dr. Ahmad Saikhu, S.Kom, MT")
    );
    assert_eq!(
      academic_name(Some("PROF IR joko PHD")).as_deref(),
      Some("Prof. Ir. Joko PhD")
    );
    assert_eq!(
      academic_name(Some("Rina S.T. M.T.")).as_deref(),
      Some("Rina ST MT")
    );
  }

  #[test]
  fn canonicalization_is_idempotent() {
    for raw in [
      "dr ahmad saikhu, s.kom, mt",
      "Prof. Dr. Ir. Joko Lianto Buliali, M.Sc., Ph.D.",
      "rina s.t., m.t",
      "ANDI SPT MSI",
      "plain name",
    ] {
      let once = academic_name(Some(raw)).unwrap();
      let twice = academic_name(Some(&once)).unwrap();
      assert_eq!(once, twice, "{raw}");
    }
  }

  #[test]
  fn trailing_dots_do_not_leak_into_canonical_titles() {
    assert_eq!(
      academic_name(Some("joko, m.sc., ph.d.")).as_deref(),
      Some("Joko, M.Sc, PhD")
    );
  }

  #[test]
  fn blanks_become_none() {
    assert_eq!(title_text(Some("   ")), None);
    assert_eq!(title_text(None), None);
    assert_eq!(email(Some(" ")), None);
    assert_eq!(section(Some("")), None);
  }

  #[test]
  fn emails_and_sections() {
    assert_eq!(
      email(Some("  Budi@ITS.ac.id ")).as_deref(),
      Some("budi@its.ac.id")
    );
    assert!(is_valid_email("a@b"));
    assert!(!is_valid_email("budi.its.ac.id"));
    assert_eq!(section(Some(" a ")).as_deref(), Some("A"));
  }
}
