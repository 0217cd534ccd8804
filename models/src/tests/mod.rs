mod connection_info;
