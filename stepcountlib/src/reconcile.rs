//! Reconciliation engine.
//!
//! Runs the whole pipeline once: load the configuration, open the report,
//! read the settings sheet, scan and count the search roots, merge the new
//! counts with the rows already in the results sheet and save the report.
//!
//! Each stage returns a `Result` and the first error stops the run. The
//! report is only written by the final save, so a failed run leaves it
//! exactly as it was.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::config::{Config, Settings};
use crate::data::{count_all, SourceFileRecord};
use crate::report::{
    apply_plan, load_results_table, load_settings_table, ReportDocument, RESULTS_FIRST_ROW,
};
use crate::source::scan;
use crate::Result;

/// A single change to the results sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum MergeAction {
    /// Overwrite the step count of an existing row
    Update {
        /// Sheet row (0-based) of the matched prior record
        row: usize,
        /// Freshly counted record
        record: SourceFileRecord,
    },
    /// Add a new row at the end of the table
    Append {
        /// 1-based position of the record in the current scan
        ordinal: usize,
        /// Freshly counted record
        record: SourceFileRecord,
    },
}

/// Ordered list of changes produced by [`plan_merge`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergePlan {
    /// Actions in scan order
    pub actions: Vec<MergeAction>,
}

impl MergePlan {
    /// Number of existing rows that will be updated.
    pub fn updated(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| matches!(a, MergeAction::Update { .. }))
            .count()
    }

    /// Number of rows that will be appended.
    pub fn appended(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| matches!(a, MergeAction::Append { .. }))
            .count()
    }

    /// Check if the plan changes nothing.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Decide, for every current record, whether it updates a prior row or is
/// appended.
///
/// Records are matched on `(directory, file_name)`. When `prior` holds the
/// same identity more than once, the first occurrence is the one updated.
/// Appended records are numbered by their position in `current`, starting
/// at 1.
///
/// # Example
///
/// ```rust
/// use stepcountlib::{plan_merge, SourceFileRecord};
///
/// let prior = vec![SourceFileRecord::new("/a/", "x.go")];
/// let current = vec![
///     SourceFileRecord::new("/a/", "x.go").with_steps(15),
///     SourceFileRecord::new("/a/", "y.go").with_steps(3),
/// ];
///
/// let plan = plan_merge(&current, &prior);
/// assert_eq!(plan.updated(), 1);
/// assert_eq!(plan.appended(), 1);
/// ```
pub fn plan_merge(current: &[SourceFileRecord], prior: &[SourceFileRecord]) -> MergePlan {
    let mut index: HashMap<(&str, &str), usize> = HashMap::with_capacity(prior.len());
    for (j, record) in prior.iter().enumerate() {
        index.entry(record.identity()).or_insert(j);
    }

    let actions = current
        .iter()
        .enumerate()
        .map(|(i, record)| match index.get(&record.identity()) {
            Some(&j) => MergeAction::Update {
                row: j + RESULTS_FIRST_ROW,
                record: record.clone(),
            },
            None => MergeAction::Append {
                ordinal: i + 1,
                record: record.clone(),
            },
        })
        .collect();

    MergePlan { actions }
}

/// Options for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Compute the merge but leave the report untouched
    pub dry_run: bool,
}

impl RunOptions {
    /// Create new default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set dry-run mode.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// Outcome of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Report that was reconciled
    pub report_path: PathBuf,
    /// Number of search roots scanned
    pub root_count: usize,
    /// Number of files counted
    pub file_count: usize,
    /// Sum of the step counts of all counted files
    pub total_steps: u64,
    /// Rows whose step count was overwritten
    pub updated: usize,
    /// Rows added to the results sheet
    pub appended: usize,
    /// Whether the report was written
    pub saved: bool,
    /// The individual merge actions
    pub plan: MergePlan,
}

/// State threaded through the stages of one run.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Immutable settings for this run
    pub settings: Settings,
    /// Report workbook, mutated in memory until saved
    pub document: ReportDocument,
}

impl RunContext {
    /// Open the report named by `config` and read its settings sheet.
    ///
    /// Fails with `SheetNotFound` if either sheet is missing, before any
    /// source file is touched.
    pub fn load(config: &Config) -> Result<Self> {
        let document = ReportDocument::open(&config.file_name)?;
        let (roots, extensions) = load_settings_table(&document, &config.sheet.setting_sheet)?;
        document.sheet(&config.sheet.result_sheet)?;
        let settings = Settings::new(config, roots, extensions);

        Ok(Self { settings, document })
    }

    /// Scan the search roots and count every matching file.
    pub fn scan(&self) -> Result<Vec<SourceFileRecord>> {
        let filter = self.settings.extension_filter();
        let mut records = scan(&self.settings.search_roots, &filter)?;
        count_all(&mut records, &self.settings.comment_markers)?;

        info!(
            files = records.len(),
            steps = records.iter().map(|r| r.steps).sum::<u64>(),
            "counted source files"
        );
        Ok(records)
    }

    /// Compare current records with the rows already in the results sheet.
    pub fn plan(&self, current: &[SourceFileRecord]) -> Result<MergePlan> {
        let prior = load_results_table(&self.document, &self.settings.results_sheet)?;
        let plan = plan_merge(current, &prior);

        info!(
            updated = plan.updated(),
            appended = plan.appended(),
            "planned merge"
        );
        Ok(plan)
    }

    /// Apply a plan to the in-memory report.
    pub fn apply(&mut self, plan: &MergePlan) -> Result<()> {
        apply_plan(&mut self.document, &self.settings.results_sheet, plan)
    }

    /// Plan and apply in one step.
    pub fn reconcile(&mut self, current: &[SourceFileRecord]) -> Result<MergePlan> {
        let plan = self.plan(current)?;
        self.apply(&plan)?;
        Ok(plan)
    }

    /// Write the report back to disk.
    pub fn save(&self) -> Result<()> {
        self.document.save()
    }
}

/// Run the whole pipeline with an already loaded configuration.
pub fn run_with_config(config: &Config, options: RunOptions) -> Result<RunSummary> {
    let mut ctx = RunContext::load(config)?;
    let current = ctx.scan()?;

    let plan = if options.dry_run {
        ctx.plan(&current)?
    } else {
        let plan = ctx.reconcile(&current)?;
        ctx.save()?;
        plan
    };

    Ok(RunSummary {
        report_path: ctx.settings.report_path.clone(),
        root_count: ctx.settings.search_roots.len(),
        file_count: current.len(),
        total_steps: current.iter().map(|r| r.steps).sum(),
        updated: plan.updated(),
        appended: plan.appended(),
        saved: !options.dry_run,
        plan,
    })
}

/// Load the configuration file and run the whole pipeline.
///
/// # Example
///
/// ```rust,ignore
/// use stepcountlib::{run, RunOptions};
///
/// let summary = run("data.yaml", RunOptions::new())?;
/// println!("{} files, {} steps", summary.file_count, summary.total_steps);
/// ```
pub fn run(config_path: impl AsRef<Path>, options: RunOptions) -> Result<RunSummary> {
    let config = Config::load(config_path)?;
    run_with_config(&config, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StepcountError;
    use crate::report::{Cell, Sheet};
    use std::fs;
    use std::path::MAIN_SEPARATOR;
    use tempfile::{tempdir, TempDir};

    fn record(dir: &str, name: &str, steps: u64) -> SourceFileRecord {
        SourceFileRecord::new(dir, name).with_steps(steps)
    }

    #[test]
    fn test_plan_update_and_append() {
        let prior = vec![record("/a/", "x.go", 0)];
        let current = vec![record("/a/", "x.go", 15), record("/a/", "y.go", 3)];

        let plan = plan_merge(&current, &prior);

        assert_eq!(
            plan.actions,
            vec![
                MergeAction::Update {
                    row: 2,
                    record: record("/a/", "x.go", 15)
                },
                MergeAction::Append {
                    ordinal: 2,
                    record: record("/a/", "y.go", 3)
                },
            ]
        );
    }

    #[test]
    fn test_plan_identity_needs_both_parts() {
        let prior = vec![record("/a/", "x.go", 0), record("/b/", "y.go", 0)];
        let current = vec![record("/b/", "x.go", 1), record("/a/", "y.go", 1)];

        let plan = plan_merge(&current, &prior);

        assert_eq!(plan.appended(), 2);
        assert_eq!(plan.updated(), 0);
    }

    #[test]
    fn test_plan_first_duplicate_wins() {
        let prior = vec![
            record("/a/", "z.go", 0),
            record("/a/", "x.go", 0),
            record("/a/", "x.go", 0),
        ];
        let current = vec![record("/a/", "x.go", 9)];

        let plan = plan_merge(&current, &prior);

        assert_eq!(
            plan.actions,
            vec![MergeAction::Update {
                row: 3,
                record: record("/a/", "x.go", 9)
            }]
        );
    }

    #[test]
    fn test_plan_empty_inputs() {
        assert!(plan_merge(&[], &[record("/a/", "x.go", 0)]).is_empty());

        let plan = plan_merge(&[record("/a/", "x.go", 1)], &[]);
        assert_eq!(plan.appended(), 1);
    }

    #[test]
    fn test_plan_ordinals_follow_scan_position() {
        let prior = vec![record("/a/", "b.go", 0)];
        let current = vec![
            record("/a/", "a.go", 1),
            record("/a/", "b.go", 1),
            record("/a/", "c.go", 1),
        ];

        let ordinals: Vec<usize> = plan_merge(&current, &prior)
            .actions
            .iter()
            .filter_map(|a| match a {
                MergeAction::Append { ordinal, .. } => Some(*ordinal),
                MergeAction::Update { .. } => None,
            })
            .collect();

        assert_eq!(ordinals, vec![1, 3]);
    }

    /// A source tree, config file and report workbook in a temp directory.
    struct Fixture {
        dir: TempDir,
        src: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempdir().unwrap();
            let src = dir.path().join("src");
            fs::create_dir_all(src.join("pkg")).unwrap();
            fs::write(src.join("main.go"), "package main\n\n// entry\nfunc main() {\n}\n").unwrap();
            fs::write(src.join("pkg/util.go"), "package pkg\n# not go\nvar X = 1\n").unwrap();
            fs::write(src.join("notes.txt"), "ignored\n").unwrap();

            fs::write(
                dir.path().join("data.yaml"),
                "file_name: report.xlsx\nsheet:\n  setting_sheet: Settings\n  result_sheet: Results\ncomment: \"//,#\"\n",
            )
            .unwrap();

            let fixture = Self { dir, src };
            fixture.write_report(&[]);
            fixture
        }

        fn config_path(&self) -> PathBuf {
            self.dir.path().join("data.yaml")
        }

        fn report_path(&self) -> PathBuf {
            self.dir.path().join("report.xlsx")
        }

        fn dir_key(&self, sub: &str) -> String {
            let dir = if sub.is_empty() {
                self.src.clone()
            } else {
                self.src.join(sub)
            };
            format!("{}{}", dir.display(), MAIN_SEPARATOR)
        }

        fn write_report(&self, rows: &[(String, &str, &str)]) {
            let mut settings = Sheet::new("Settings");
            settings.set(3, 1, Cell::text(self.src.display().to_string()));
            settings.set(3, 2, Cell::text(".go"));

            let mut results = Sheet::new("Results");
            results.set(1, 1, Cell::text("No"));
            for (i, (dir, name, steps)) in rows.iter().enumerate() {
                results.set(2 + i, 1, Cell::text((i + 1).to_string()));
                results.set(2 + i, 2, Cell::text(dir.as_str()));
                results.set(2 + i, 3, Cell::text(*name));
                results.set(2 + i, 4, Cell::text(*steps));
            }

            ReportDocument::from_sheets(self.report_path(), vec![settings, results])
                .save()
                .unwrap();
        }
    }

    #[test]
    fn test_run_appends_new_files() {
        let fixture = Fixture::new();

        let summary = run(fixture.config_path(), RunOptions::new()).unwrap();

        assert_eq!(summary.root_count, 1);
        assert_eq!(summary.file_count, 2);
        assert_eq!(summary.total_steps, 5);
        assert_eq!(summary.appended, 2);
        assert_eq!(summary.updated, 0);
        assert!(summary.saved);

        let doc = ReportDocument::open(fixture.report_path()).unwrap();
        let results = doc.sheet("Results").unwrap();
        assert_eq!(results.row_count(), 4);
        assert_eq!(results.text(2, 3), "main.go");
        assert_eq!(results.text(2, 4), "3");
        assert_eq!(results.text(3, 2), fixture.dir_key("pkg"));
        assert_eq!(results.text(3, 3), "util.go");
        assert_eq!(results.text(3, 4), "2");
    }

    #[test]
    fn test_run_updates_existing_rows_in_place() {
        let fixture = Fixture::new();
        fixture.write_report(&[
            (fixture.dir_key("old"), "gone.go", "8"),
            (fixture.dir_key(""), "main.go", "10"),
        ]);

        let summary = run(fixture.config_path(), RunOptions::new()).unwrap();
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.appended, 1);

        let doc = ReportDocument::open(fixture.report_path()).unwrap();
        let results = doc.sheet("Results").unwrap();
        assert_eq!(results.row_count(), 5);
        // Stale rows are kept as they were
        assert_eq!(results.text(2, 3), "gone.go");
        assert_eq!(results.text(2, 4), "8");
        // main.go keeps its position and ordinal
        assert_eq!(results.text(3, 1), "2");
        assert_eq!(results.text(3, 3), "main.go");
        assert_eq!(results.text(3, 4), "3");
        assert_eq!(results.text(4, 3), "util.go");
    }

    #[test]
    fn test_run_twice_is_stable() {
        let fixture = Fixture::new();

        run(fixture.config_path(), RunOptions::new()).unwrap();
        let second = run(fixture.config_path(), RunOptions::new()).unwrap();

        assert_eq!(second.appended, 0);
        assert_eq!(second.updated, 2);
        let doc = ReportDocument::open(fixture.report_path()).unwrap();
        assert_eq!(doc.sheet("Results").unwrap().row_count(), 4);
    }

    #[test]
    fn test_dry_run_leaves_report_untouched() {
        let fixture = Fixture::new();
        let before = fs::read(fixture.report_path()).unwrap();

        let summary = run(fixture.config_path(), RunOptions::new().dry_run(true)).unwrap();

        assert_eq!(summary.appended, 2);
        assert!(!summary.saved);
        assert_eq!(fs::read(fixture.report_path()).unwrap(), before);
    }

    #[cfg(unix)]
    #[test]
    fn test_second_of_five_unreadable_aborts_before_save() {
        let fixture = Fixture::new();
        fs::remove_dir_all(&fixture.src).unwrap();
        fs::create_dir_all(&fixture.src).unwrap();
        for name in ["a.go", "c.go", "d.go", "e.go"] {
            fs::write(fixture.src.join(name), "package batch\nvar X = 1\n").unwrap();
        }
        // b.go sorts second and cannot be opened
        std::os::unix::fs::symlink(fixture.src.join("missing-target"), fixture.src.join("b.go"))
            .unwrap();
        let before = fs::read(fixture.report_path()).unwrap();

        let result = run(fixture.config_path(), RunOptions::new());

        match result {
            Err(StepcountError::FileRead { path, .. }) => {
                assert_eq!(path, fixture.src.join("b.go"))
            }
            other => panic!("expected FileRead, got {other:?}"),
        }
        assert_eq!(fs::read(fixture.report_path()).unwrap(), before);
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_file_aborts_before_save() {
        let fixture = Fixture::new();
        // A dangling symlink matches the extension but cannot be opened.
        std::os::unix::fs::symlink(
            fixture.src.join("missing-target"),
            fixture.src.join("broken.go"),
        )
        .unwrap();
        let before = fs::read(fixture.report_path()).unwrap();

        let result = run(fixture.config_path(), RunOptions::new());

        assert!(matches!(result, Err(StepcountError::FileRead { .. })));
        assert_eq!(fs::read(fixture.report_path()).unwrap(), before);
    }

    #[test]
    fn test_missing_root_aborts_before_save() {
        let fixture = Fixture::new();
        fs::remove_dir_all(&fixture.src).unwrap();
        let before = fs::read(fixture.report_path()).unwrap();

        let result = run(fixture.config_path(), RunOptions::new());

        assert!(matches!(result, Err(StepcountError::DirectoryAccess { .. })));
        assert_eq!(fs::read(fixture.report_path()).unwrap(), before);
    }

    #[test]
    fn test_missing_results_sheet_fails_before_scanning() {
        let fixture = Fixture::new();
        let mut settings = Sheet::new("Settings");
        // The root does not exist, so reaching the scan would fail differently.
        let missing = fixture.dir.path().join("no-such-dir");
        settings.set(3, 1, Cell::text(missing.display().to_string()));
        settings.set(3, 2, Cell::text(".go"));
        ReportDocument::from_sheets(fixture.report_path(), vec![settings])
            .save()
            .unwrap();

        let result = run(fixture.config_path(), RunOptions::new());

        match result {
            Err(StepcountError::SheetNotFound { sheet, .. }) => assert_eq!(sheet, "Results"),
            other => panic!("expected SheetNotFound, got {other:?}"),
        }
    }

    /// Worksheet XML of the Results sheet, the second sheet in the workbook.
    fn results_xml(path: &Path) -> String {
        use std::io::Read;

        let mut archive = zip::ZipArchive::new(fs::File::open(path).unwrap()).unwrap();
        let mut entry = archive.by_name("xl/worksheets/sheet2.xml").unwrap();
        let mut xml = String::new();
        entry.read_to_string(&mut xml).unwrap();
        xml
    }

    fn header_style(xml: &str) -> Option<String> {
        let start = xml.find("<c r=\"B2\"")?;
        let tag = &xml[start..start + xml[start..].find('>')?];
        let value = tag.find(" s=\"")? + 4;
        Some(tag[value..value + tag[value..].find('"')?].to_string())
    }

    #[test]
    fn test_run_keeps_formula_and_bold_header() {
        use calamine::{open_workbook, Reader, Xlsx};
        use rust_xlsxwriter::{Format, Workbook};

        let fixture = Fixture::new();
        let bold = Format::new().set_bold();
        let mut workbook = Workbook::new();
        let settings = workbook.add_worksheet().set_name("Settings").unwrap();
        settings
            .write_string(3, 1, fixture.src.display().to_string())
            .unwrap();
        settings.write_string(3, 2, ".go").unwrap();
        let results = workbook.add_worksheet().set_name("Results").unwrap();
        for (col, header) in ["No", "Directory", "File", "Steps"].iter().enumerate() {
            results
                .write_string_with_format(1, col as u16 + 1, *header, &bold)
                .unwrap();
        }
        results.write_formula(0, 6, "=SUM(E3:E100)").unwrap();
        workbook.save(fixture.report_path()).unwrap();
        let bold_style = header_style(&results_xml(&fixture.report_path()));
        assert!(bold_style.is_some());

        run(fixture.config_path(), RunOptions::new()).unwrap();
        let second = run(fixture.config_path(), RunOptions::new()).unwrap();
        assert_eq!(second.updated, 2);

        let mut workbook = open_workbook::<Xlsx<_>, _>(fixture.report_path()).unwrap();
        let formulas = workbook.worksheet_formula("Results").unwrap();
        assert!(formulas
            .used_cells()
            .any(|(_, _, formula)| formula.contains("SUM(E3:E100)")));
        assert_eq!(header_style(&results_xml(&fixture.report_path())), bold_style);

        let doc = ReportDocument::open(fixture.report_path()).unwrap();
        let results = doc.sheet("Results").unwrap();
        assert_eq!(results.text(1, 1), "No");
        assert_eq!(results.text(2, 3), "main.go");
        assert_eq!(results.text(3, 3), "util.go");
    }

    #[test]
    fn test_missing_report() {
        let fixture = Fixture::new();
        fs::remove_file(fixture.report_path()).unwrap();

        assert!(matches!(
            run(fixture.config_path(), RunOptions::new()),
            Err(StepcountError::ReportOpen { .. })
        ));
    }
}
