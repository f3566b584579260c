//! courier-core
//!
//! Core building blocks for the Courier task queue.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, task_kind, envelope, options, state, errors）
//! - **ports**: 抽象化レイヤー（Broker, UserStore, Mailer, Clock, IdGenerator）
//! - **typed**: 型付き Task API（Task trait, Handler trait, TypedRegistry, PayloadCodec）
//! - **app**: アプリケーションロジック（Distributor, Processor, post-commit effects）
//! - **impls**: 実装（InMemoryBroker など開発用）
//! - **tasks**: タスク定義と handler
//! - **settings** / **telemetry**: 設定とログ

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod settings;
pub mod tasks;
pub mod telemetry;
pub mod typed;
