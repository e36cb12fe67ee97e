//! 测试工具：外部服务的内存模拟实现、数据构造器和异步断言辅助

pub mod builders;
pub mod helpers;
pub mod mocks;

pub use builders::*;
pub use helpers::*;
pub use mocks::*;
