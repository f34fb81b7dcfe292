// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

// Export the compile-time kernel configuration as `OUT_DIR/config.rs`.

fn main() -> anyhow::Result<()> {
    portos_build::export_config()
}
