use std::collections::HashMap;

use super::Conformance;
use crate::{
  dimension::CourseOffering,
  normalize,
  rejection::Rejection,
  source::{CourseRecord, SourceSnapshot},
};

/// Cleaned course offerings: every class joined to its course, in class id
/// order. A class whose course is unknown keeps an empty name and credit
/// count. Duplicates are left in place; the SCD2 planner resolves them.
pub fn conform_courses(snapshot: &SourceSnapshot) -> Conformance<CourseOffering> {
  let courses: HashMap<&str, &CourseRecord> = snapshot
    .courses
    .iter()
    .map(|c| (c.code.trim(), c))
    .collect();

  let mut classes: Vec<_> = snapshot.classes.iter().collect();
  classes.sort_by_key(|c| c.id);

  let mut out = Conformance::default();
  for class in classes {
    let code = class.course_code.trim();
    let Some(section) = normalize::section(class.section.as_deref()) else {
      out.rejected.record(Rejection::MissingNaturalKey);
      continue;
    };
    if code.is_empty() {
      out.rejected.record(Rejection::MissingNaturalKey);
      continue;
    }
    let course = courses.get(code);
    out.rows.push(CourseOffering {
      code: code.to_string(),
      name: course.and_then(|c| normalize::title_text(c.name.as_deref())),
      credits: course.and_then(|c| c.credits),
      section,
      instructor: normalize::academic_name(class.instructor.as_deref()),
      capacity: class.capacity,
    });
  }
  out
}
