use crate::domain::model::Record;
use crate::utils::error::Result;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// 提供已驗證過的成交紀錄 (price / lat / lon 皆為有限值)
pub trait RecordSource: Send + Sync {
    fn load_records(&self) -> impl std::future::Future<Output = Result<Vec<Record>>> + Send;
}

/// 使用者點選某筆紀錄時接收原始 Record
pub trait SelectionSink {
    fn on_select(&mut self, record: &Record);
}

impl<F: FnMut(&Record)> SelectionSink for F {
    fn on_select(&mut self, record: &Record) {
        self(record)
    }
}
