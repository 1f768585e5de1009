// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Shell support: scripts emitted for `eval` by the 'genv' shell function.

use crate::cli::ShellArgs;
use crate::error::{Error, Result};
use crate::sdk;
use crate::utils;

const INIT: &str = r#"_genv_append_to_env()
{
  # based on https://unix.stackexchange.com/a/415028
  export $1="${!1:+${!1}:}$2"
}

_genv_backup_env()
{
  if [ -n "${!1}" ]; then
    export GENV_BACKUP_ENV_$1="${!1}"
    _genv_append_to_env GENV_BACKUP_ENVS $1
  fi
}

_genv_set_env()
{
  export $1="$2"
  _genv_append_to_env GENV_ENVS $1
}

_genv_replace_env()
{
  _genv_backup_env $1
  _genv_set_env $1 "$2"
}

_genv_unset_env()
{
  unset $1
}

_genv_unset_envs()
{
  IFS=: read -a names <<< "$GENV_ENVS"
  unset GENV_ENVS

  for name in "${names[@]}"
  do
    unset $name
  done
}

_genv_restore_env()
{
  backup="GENV_BACKUP_ENV_$1"
  if [ -n "${!backup}" ]; then
    export $1="${!backup}"
  fi
  unset $backup
}

_genv_restore_envs()
{
  IFS=: read -a names <<< "$GENV_BACKUP_ENVS"
  unset GENV_BACKUP_ENVS

  for name in "${names[@]}"
  do
    _genv_restore_env $name
  done
}

genv()
{
  local command="${1:-}"
  if [ "$#" -gt 0 ]; then
    shift
  fi

  case "$command" in
  activate|deactivate)
    eval "$(command genv $command --shell $$ $@)"
    ;;
  config)
    command genv config $@

    if [ "$?" -eq 0 ]; then
      eval "$(command genv shell --reconfigure)"
    fi
    ;;
  attach|detach)
    command genv $command $@

    if [ "$?" -eq 0 ]; then
      eval "$(command genv shell --reattach)"
    fi
    ;;
  shell)
    if [ "$#" -eq 0 ]; then
      command genv shell --ok
    else
      command genv shell $@
    fi
    ;;
  *)
    command genv $command $@
    ;;
  esac
}

if [ "$GENV_PREACTIVATE" = "1" ]; then
  command="genv activate"

  if [ "$GENV_PREACTIVATE_PROMPT" = "0" ]; then
    command="$command --no-prompt"
  fi

  if [ -n "$GENV_PREACTIVATE_GPUS" ]; then
    command="$command --gpus $GENV_PREACTIVATE_GPUS"
  fi

  if [ -n "$GENV_PREACTIVATE_ENVIRONMENT_NAME" ]; then
    command="$command --name $GENV_PREACTIVATE_ENVIRONMENT_NAME"
  fi

  $command
fi"#;

const DEINIT: &str = r#"unset -f genv
unset -f _genv_restore_envs
unset -f _genv_restore_env
unset -f _genv_unset_envs
unset -f _genv_unset_env
unset -f _genv_replace_env
unset -f _genv_set_env
unset -f _genv_backup_env
unset -f _genv_append_to_env"#;

const OK: &str = r#"Your shell is initialized properly and you are all set.
Run the following command to check the status of your environment:

    genv status"#;

fn do_reattach() -> Result<()> {
    let indices = sdk::devices::refresh_attached(&utils::temp_dir())?;

    let value = if indices.is_empty() {
        "-1".to_string()
    } else {
        indices
            .iter()
            .map(|index| index.to_string())
            .collect::<Vec<_>>()
            .join(",")
    };

    println!("_genv_replace_env CUDA_VISIBLE_DEVICES {value}");

    Ok(())
}

fn do_reconfigure() -> Result<()> {
    let config = sdk::env::refresh_configuration(&utils::temp_dir())?;

    let fields = [
        ("GENV_ENVIRONMENT_NAME", config.name),
        ("GENV_GPU_MEMORY", config.gpu_memory),
        ("GENV_GPUS", config.gpus.map(|gpus| gpus.to_string())),
    ];

    for (name, value) in fields {
        match value {
            Some(value) => println!("_genv_set_env {name} {value}"),
            None => println!("_genv_unset_env {name}"),
        }
    }

    Ok(())
}

/// Runs the "genv shell" logic.
pub fn run(args: &ShellArgs) -> Result<()> {
    if args.init {
        println!("{INIT}");
    } else if args.deinit {
        println!("{DEINIT}");
    } else if args.ok {
        println!("{OK}");
    } else if args.reattach {
        do_reattach()?;
    } else if args.reconfigure {
        do_reconfigure()?;
    } else {
        println!("{}", Error::ShellNotInitialized);
    }

    Ok(())
}
