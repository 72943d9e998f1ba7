pub mod innertube; // get_live_chat クライアント
pub mod youtube; // 視聴ページ解析・動画ID抽出
