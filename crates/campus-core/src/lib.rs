pub mod cli;
pub mod commands;
pub mod config;
pub mod datastore;
pub mod datetime;
pub mod render;
pub mod roster;
pub mod slot;
pub mod timetable;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

use crate::cli::{
  GlobalCli,
  Invocation
};
use crate::config::Config;
use crate::datastore::DataStore;
use crate::render::Renderer;

/// Everything one command needs: the
/// effective settings, the opened
/// store and the output renderer.
#[derive(Debug)]
pub struct Session {
  pub cfg:      Config,
  pub store:    DataStore,
  pub renderer: Renderer
}

impl Session {
  /// Layers the rc file, bare
  /// `rc.key=value` tokens and `--rc`
  /// flags (in that order, later wins),
  /// then opens the data directory.
  pub fn open(
    cli: &GlobalCli,
    bare_overrides: Vec<(
      String,
      String
    )>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::load(
      cli.campusrc.as_deref()
    )?;
    let flag_overrides = cli
      .rc_overrides
      .iter()
      .map(|kv| {
        (kv.key.clone(), kv.value.clone())
      });
    cfg.apply_overrides(
      bare_overrides
        .into_iter()
        .chain(flag_overrides)
    );

    let data_dir =
      config::resolve_data_dir(
        &cfg,
        cli.data.as_deref()
      )
      .context(
        "failed to resolve data \
         directory"
      )?;
    let store = DataStore::open(
      &data_dir
    )
    .with_context(|| {
      format!(
        "failed to open timetable \
         data at {}",
        data_dir.display()
      )
    })?;
    let renderer = Renderer::new(&cfg)?;

    debug!(
      data_dir = %data_dir.display(),
      rc_files = cfg.loaded_files.len(),
      "session ready"
    );
    Ok(Self {
      cfg,
      store,
      renderer
    })
  }
}

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli =
    GlobalCli::parse_from(pre.cleaned_args);
  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;
  info!("campus starting");

  let mut session =
    Session::open(&cli, pre.rc_overrides)?;
  let inv = Invocation::parse(
    &session.cfg,
    cli.rest
  )?;

  commands::dispatch(
    &mut session.store,
    &session.cfg,
    &mut session.renderer,
    inv
  )
}

#[cfg(test)]
mod tests {
  use std::fs;

  use clap::Parser;
  use tempfile::tempdir;

  use super::Session;
  use crate::cli::GlobalCli;

  #[test]
  fn session_layers_rc_file_then_overrides()
   {
    let temp =
      tempdir().expect("tempdir");
    let rc = temp.path().join("campusrc");
    fs::write(
      &rc,
      "timetable.class = 9C\n\
       timetable.refresh = 30\n\
       color = off\n"
    )
    .expect("write rc");
    let data = temp.path().join("data");

    let cli = GlobalCli::parse_from([
      "campus".into(),
      "--campusrc".into(),
      rc.clone().into_os_string(),
      "--data".into(),
      data.clone().into_os_string(),
      "--rc".into(),
      "timetable.class=10A".into(),
      "week".into()
    ]);
    let session = Session::open(
      &cli,
      vec![
        (
          "timetable.class".to_string(),
          "11B".to_string()
        ),
        (
          "timetable.refresh".to_string(),
          "90".to_string()
        ),
      ]
    )
    .expect("open session");

    assert_eq!(
      session
        .cfg
        .get("timetable.class")
        .as_deref(),
      Some("10A")
    );
    assert_eq!(
      session
        .cfg
        .get("timetable.refresh")
        .as_deref(),
      Some("90")
    );
    assert_eq!(
      session.cfg.loaded_files,
      vec![rc]
    );
    assert_eq!(session.store.data_dir, data);
    assert!(data.is_dir());
  }
}
