// This file is part of the terraform-provider-citrix project
//
// Copyright (C) ANEO, 2024-2024. All rights reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License")
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

use anyhow::Result;
use tf_provider::serve;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use provider::CitrixProvider;

mod client;
mod config;
mod delivery_group;
mod directory_connection;
mod gac_settings;
mod hypervisor;
mod jobs;
mod machine_catalog;
mod provider;
mod reconcile;
mod resolver;
mod tag;
mod utils;

#[tokio::main]
async fn main() -> Result<()> {
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling pending jobs");
            on_interrupt.cancel();
        }
    });

    serve("citrix", CitrixProvider::new(cancel)).await
}
