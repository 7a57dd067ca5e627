// SPDX-License-Identifier: Apache-2.0
pub mod common;
pub mod inspect;
pub mod transfer;
